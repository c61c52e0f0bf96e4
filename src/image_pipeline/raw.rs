//! RAW input module
//!
//! Sensor description types, the decoder registry, and the decoding and stream
//! strategies that fill raw buffers.

pub mod color;
pub mod filters;
pub mod geometry;
mod rawloader_reader;
mod reader;
pub mod registry;
pub mod stream;
pub mod types;
mod unpacked_reader;

pub use color::{ColorState, SplitBlackReference};
pub use filters::FilterPattern;
pub use geometry::{CropBox, DiagonalLayout, SensorGeometry};
pub use rawloader_reader::RawLoaderDecoder;
pub use reader::RawDecoder;
pub use registry::{DecoderId, describe};
pub use stream::{BufferStream, DataStream, FileStream};
pub use types::{DecoderDescriptor, Identification, LayoutClass, RawBuffer};
pub use unpacked_reader::UnpackedDecoder;
