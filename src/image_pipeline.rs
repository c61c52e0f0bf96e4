//! RAW processing pipeline
//!
//! A [`RawProcessor`] session identifies a file, unpacks its sensor data, converts
//! it into a 4-channel working image and runs the development stages on it, in
//! the order enforced by the progress state machine. Decoding, development
//! strategies and TIFF encoding sit behind traits so that each can be swapped.

pub mod banding;
pub mod black_level;
pub mod buffers;
pub mod common;
pub mod convert;
pub mod debayer;
pub mod exposure;
pub mod options;
pub mod output;
pub mod processing;
pub mod progress;
pub mod raw;
pub mod strategies;
pub mod tiff;

pub use common::{ErrorCode, Fault, ProcessingError, Result};

pub use options::{ProcessingOptions, ProcessingOptionsBuilder};

pub use progress::{ProgressAction, ProgressCallback, ProgressFlags, ProgressStage};

pub use raw::{
    BufferStream, CropBox, DataStream, DecoderId, FileStream, RawDecoder, RawLoaderDecoder,
    UnpackedDecoder,
};

pub use processing::RawProcessor;

pub use output::{MemImageFormat, ProcessedImage, Samples};

pub use tiff::{StandardTiffWriter, TiffCompression, TiffOptions, TiffWriter};
