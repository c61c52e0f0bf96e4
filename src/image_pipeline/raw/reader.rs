use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::stream::DataStream;
use crate::image_pipeline::raw::types::{Identification, RawBuffer};

/// A file-format specific decoding strategy.
///
/// `identify` inspects the stream and reports geometry and color metadata;
/// `load_raw` fills a buffer that was allocated for the layout the registry
/// assigned to [`Identification::decoder`].
pub trait RawDecoder {
    fn identify(&mut self, stream: &mut dyn DataStream) -> Result<Identification, Fault>;

    fn load_raw(
        &mut self,
        stream: &mut dyn DataStream,
        target: &mut RawBuffer,
        geometry: &SensorGeometry,
        color: &mut ColorState,
    ) -> Result<(), Fault>;
}
