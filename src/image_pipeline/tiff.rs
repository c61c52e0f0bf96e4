//! TIFF writing module
//!
//! Encodes rendered images with the compression options of [`TiffOptions`].

mod standard_tiff_writer;
pub mod types;
mod writer;

pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{TiffCompression, TiffOptions, TiffOptionsBuilder};
pub use writer::TiffWriter;
