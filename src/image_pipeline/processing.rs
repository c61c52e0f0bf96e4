//! Processing session
//!
//! [`RawProcessor`] owns every buffer of one file and drives the pipeline
//! through the stage order kept by the progress state machine.

mod processor;
#[cfg(test)]
mod tests;
mod timing;

pub use processor::RawProcessor;
pub use timing::{StageTiming, StageTimings, Timer};
