//! Common utilities module
//!
//! Error taxonomy and allocation helpers shared across the pipeline.

pub mod alloc;
pub mod error;

pub use error::{ErrorCode, Fault, ProcessingError, Result};
