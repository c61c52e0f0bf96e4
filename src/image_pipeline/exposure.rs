//! Linear exposure shift with highlight preservation.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;

const LUT_MAX: usize = 65535;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureOptions {
    /// Linear gain, clamped to [0.25, 8].
    pub shift: f32,
    /// 0 keeps the gain up to clipping, 1 bends highlights back under the white point.
    pub preserve: f32,
}

impl Default for ExposureOptions {
    fn default() -> Self {
        Self { shift: 1.0, preserve: 0.0 }
    }
}

/// Builds the 65536 entry tone curve for `options`.
pub fn exposure_lut(options: &ExposureOptions) -> Result<Vec<u16>, Fault> {
    let shift = options.shift.clamp(0.25, 8.0);
    let preserve = options.preserve.clamp(0.0, 1.0);
    let mut lut = try_filled(LUT_MAX + 1, 0u16)?;

    if shift <= 1.0 {
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = (i as f32 * shift) as u16;
        }
        return Ok(lut);
    }

    let cstops = shift.log2();
    let roomlin = 2f32.powf(cstops * 2.0);
    let x2 = LUT_MAX as f32;
    let x1 = (x2 + 1.0) / roomlin - 1.0;
    let y1 = x1 * shift;
    let y2 = x2 * (1.0 + (1.0 - preserve) * (shift - 1.0));
    let sq3x = (x1 * x1 * x2).cbrt();
    let b = (y2 - y1 + shift * (3.0 * x1 - 3.0 * sq3x)) / (x2 + 2.0 * x1 - 3.0 * sq3x);
    let a = (shift - b) * 3.0 * (x1 * x1).cbrt();
    let c = y2 - a * x2.cbrt() - b * x2;

    for (i, entry) in lut.iter_mut().enumerate() {
        let x = i as f32;
        *entry = if x < x1 {
            (x * shift) as u16
        } else {
            (a * x.cbrt() + b * x + c).clamp(0.0, x2) as u16
        };
    }
    Ok(lut)
}

/// Runs every channel, the channel maxima and the saturation point through the curve.
#[instrument(skip(image, color))]
pub fn apply_exposure(
    image: &mut ImageBuffer,
    color: &mut ColorState,
    options: &ExposureOptions,
) -> Result<(), Fault> {
    let lut = exposure_lut(options)?;
    let map = |value: u32| lut[(value as usize).min(LUT_MAX)] as u32;

    image.pixels.par_iter_mut().for_each(|px| {
        for value in px.iter_mut() {
            *value = lut[*value as usize];
        }
    });
    for max in &mut color.channel_maximum {
        *max = map(*max);
    }
    color.maximum = map(color.maximum);
    debug!(maximum = color.maximum, "Exposure correction applied");
    Ok(())
}
