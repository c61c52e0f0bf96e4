//! Stage ordering.
//!
//! Every public operation of the processor checks the flags kept here before it
//! touches any state.

use std::fmt;

use crate::image_pipeline::common::error::{ProcessingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressStage {
    Open,
    Identify,
    SizeAdjust,
    LoadRaw,
    RemoveZeroes,
    BadPixels,
    DarkFrame,
    FoveonInterpolate,
    ScaleColors,
    PreInterpolate,
    Interpolate,
    MixGreen,
    MedianFilter,
    Highlights,
    FujiRotate,
    Flip,
    ApplyProfile,
    ConvertRgb,
    Stretch,
    ThumbLoad,
}

impl ProgressStage {
    pub const ALL: [ProgressStage; 20] = [
        Self::Open,
        Self::Identify,
        Self::SizeAdjust,
        Self::LoadRaw,
        Self::RemoveZeroes,
        Self::BadPixels,
        Self::DarkFrame,
        Self::FoveonInterpolate,
        Self::ScaleColors,
        Self::PreInterpolate,
        Self::Interpolate,
        Self::MixGreen,
        Self::MedianFilter,
        Self::Highlights,
        Self::FujiRotate,
        Self::Flip,
        Self::ApplyProfile,
        Self::ConvertRgb,
        Self::Stretch,
        Self::ThumbLoad,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Stages whose flags must be set before this one may be.
    pub fn prerequisites(self) -> &'static [ProgressStage] {
        use ProgressStage::*;
        match self {
            Open => &[],
            Identify => &[Open],
            SizeAdjust => &[Identify],
            LoadRaw => &[SizeAdjust],
            RemoveZeroes | BadPixels | DarkFrame | FoveonInterpolate | ScaleColors
            | PreInterpolate => &[LoadRaw],
            Interpolate | MixGreen | MedianFilter | Highlights | ApplyProfile | ConvertRgb => {
                &[PreInterpolate]
            }
            Stretch => &[ConvertRgb],
            FujiRotate | Flip | ThumbLoad => &[Identify],
        }
    }

    pub fn description(self) -> &'static str {
        use ProgressStage::*;
        match self {
            Open => "Opening file",
            Identify => "Reading metadata",
            SizeAdjust => "Adjusting size",
            LoadRaw => "Reading RAW data",
            RemoveZeroes => "Clearing zero values",
            BadPixels => "Removing dead pixels",
            DarkFrame => "Subtracting dark frame data",
            FoveonInterpolate => "Interpolating Foveon sensor data",
            ScaleColors => "Scaling colors",
            PreInterpolate => "Pre-interpolating",
            Interpolate => "Interpolating",
            MixGreen => "Mixing green channels",
            MedianFilter => "Median filter",
            Highlights => "Highlight recovery",
            FujiRotate => "Rotating Fuji diagonal data",
            Flip => "Flipping image",
            ApplyProfile => "ICC conversion",
            ConvertRgb => "Converting to RGB",
            Stretch => "Stretching image",
            ThumbLoad => "Loading thumbnail",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Set of completed stages. The empty set is the "Starting" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressFlags(u32);

impl ProgressFlags {
    pub fn contains(self, stage: ProgressStage) -> bool {
        self.0 & stage.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Highest completed stage, if any.
    pub fn latest(self) -> Option<ProgressStage> {
        ProgressStage::ALL.iter().rev().copied().find(|s| self.contains(*s))
    }

    pub fn description(self) -> &'static str {
        self.latest().map_or("Starting", ProgressStage::description)
    }
}

/// Answer of a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    Continue,
    Cancel,
}

/// Invoked with `(stage, current, total)` at stage boundaries.
pub type ProgressCallback = Box<dyn FnMut(ProgressStage, u32, u32) -> ProgressAction + Send>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressStateMachine {
    flags: ProgressFlags,
}

impl ProgressStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> ProgressFlags {
        self.flags
    }

    pub fn is_done(&self, stage: ProgressStage) -> bool {
        self.flags.contains(stage)
    }

    /// Fails unless `stage` has completed.
    pub fn require(&self, stage: ProgressStage) -> Result<()> {
        if self.flags.contains(stage) {
            Ok(())
        } else {
            Err(ProcessingError::OutOfOrderCall(format!(
                "requires '{}' to have completed",
                stage.description()
            )))
        }
    }

    /// Fails if any stage after `stage` has completed.
    pub fn require_at_most(&self, stage: ProgressStage) -> Result<()> {
        match self.flags.latest() {
            Some(latest) if latest > stage => Err(ProcessingError::OutOfOrderCall(format!(
                "'{}' already completed",
                latest.description()
            ))),
            _ => Ok(()),
        }
    }

    /// Marks `stage` complete. Idempotent.
    pub fn advance(&mut self, stage: ProgressStage) -> Result<()> {
        if let Some(missing) = stage.prerequisites().iter().find(|p| !self.flags.contains(**p)) {
            return Err(ProcessingError::OutOfOrderCall(format!(
                "'{}' requires '{}'",
                stage.description(),
                missing.description()
            )));
        }
        self.flags.0 |= stage.bit();
        Ok(())
    }

    /// Clears every flag later than `stage`.
    pub fn rewind_to(&mut self, stage: ProgressStage) {
        self.flags.0 &= (stage.bit() << 1) - 1;
    }

    pub fn reset(&mut self) {
        self.flags = ProgressFlags::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::error::ErrorCode;
    use ProgressStage::*;

    fn loaded() -> ProgressStateMachine {
        let mut machine = ProgressStateMachine::new();
        for stage in [Open, Identify, SizeAdjust, LoadRaw] {
            machine.advance(stage).unwrap();
        }
        machine
    }

    #[test]
    fn test_require_fails_until_advanced() {
        let mut machine = ProgressStateMachine::new();
        for stage in ProgressStage::ALL {
            let err = machine.require(stage).unwrap_err();
            assert_eq!(err.code(), ErrorCode::OutOfOrderCall);
        }
        machine.advance(Open).unwrap();
        assert!(machine.require(Open).is_ok());
        assert!(machine.require(Identify).is_err());
    }

    #[test]
    fn test_advance_checks_prerequisites() {
        let mut machine = ProgressStateMachine::new();
        assert!(machine.advance(LoadRaw).is_err());
        assert!(machine.flags().is_empty());

        let mut machine = loaded();
        assert!(machine.advance(Interpolate).is_err());
        machine.advance(PreInterpolate).unwrap();
        machine.advance(Interpolate).unwrap();
        assert!(machine.advance(Stretch).is_err());
    }

    #[test]
    fn test_every_stage_reachable_in_declared_order() {
        let mut machine = ProgressStateMachine::new();
        for stage in ProgressStage::ALL {
            machine.advance(stage).unwrap();
            machine.require(stage).unwrap();
        }
        assert_eq!(machine.flags().latest(), Some(ThumbLoad));
    }

    #[test]
    fn test_advance_is_idempotent() {
        let mut once = loaded();
        once.advance(BadPixels).unwrap();
        let mut twice = once.clone();
        twice.advance(BadPixels).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_require_at_most() {
        let mut machine = loaded();
        assert!(machine.require_at_most(LoadRaw).is_ok());
        machine.advance(PreInterpolate).unwrap();
        assert!(machine.require_at_most(LoadRaw).is_err());
        assert!(machine.require_at_most(PreInterpolate).is_ok());
    }

    #[test]
    fn test_rewind_and_reset() {
        let mut machine = loaded();
        machine.advance(PreInterpolate).unwrap();
        machine.advance(MixGreen).unwrap();
        machine.rewind_to(LoadRaw);
        assert!(machine.is_done(LoadRaw));
        assert!(!machine.is_done(PreInterpolate));
        assert!(!machine.is_done(MixGreen));
        machine.reset();
        assert!(machine.flags().is_empty());
        assert_eq!(machine.flags().description(), "Starting");
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(LoadRaw.to_string(), "Reading RAW data");
        assert_eq!(loaded().flags().description(), "Reading RAW data");
    }
}
