use std::io::Write;

use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::output::ProcessedImage;
use crate::image_pipeline::tiff::types::TiffOptions;

/// Encodes a rendered image.
pub trait TiffWriter {
    fn write_tiff(&self, image: &ProcessedImage, output: &mut dyn Write, options: &TiffOptions) -> Result<(), Fault>;
}
