//! Black level subtraction and saturation adjustment on the canonical image.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;

pub const DEFAULT_ADJUST_MAXIMUM_THRESHOLD: f32 = 0.75;

/// Which of the three mutually exclusive subtraction paths ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackSubtraction {
    /// Position dependent split reference.
    SplitReference,
    /// Per-channel offsets plus scalar black.
    Offsets,
    /// Nothing to subtract, channel maxima recomputed only.
    MaximumOnly,
}

/// Removes the black level from `image` and recomputes `color.channel_maximum`.
///
/// After this returns the color state carries no black: a second call only
/// recomputes the channel maxima.
#[instrument(skip_all, fields(width = geometry.width, height = geometry.height))]
pub fn subtract_black(
    image: &mut ImageBuffer,
    geometry: &SensorGeometry,
    color: &mut ColorState,
    shrink: bool,
) -> Result<BlackSubtraction, Fault> {
    if image.width != geometry.iwidth || image.height != geometry.iheight {
        return Err(Fault::DecodeRaw(format!(
            "image is {}x{}, geometry expects {}x{}",
            image.width, image.height, geometry.iwidth, geometry.iheight
        )));
    }

    if let Some(reference) = color.split_black.take() {
        let (top, left) = (geometry.top_margin, geometry.left_margin);
        color.channel_maximum = map_photosites(image, geometry, shrink, |row, col, value| {
            let shifted = value as i32 - reference.t_black + reference.at(row + top, col + left);
            shifted.clamp(0, u16::MAX as i32) as u16
        });
        color.maximum = color.maximum.saturating_sub(color.black);
        color.cblack = [0; 4];
        color.black = 0;
        debug!(maximum = color.maximum, "Subtracted split black reference");
        return Ok(BlackSubtraction::SplitReference);
    }

    if color.has_black() {
        let cblk = color.combined_black();
        color.channel_maximum = map_channels(image, geometry, shrink, |cc, value| {
            (value as u32).saturating_sub(cblk[cc]) as u16
        });
        color.maximum = color.maximum.saturating_sub(color.black);
        color.cblack = [0; 4];
        color.black = 0;
        debug!(?cblk, maximum = color.maximum, "Subtracted black level");
        return Ok(BlackSubtraction::Offsets);
    }

    color.channel_maximum = image.channel_maximum();
    Ok(BlackSubtraction::MaximumOnly)
}

/// Lowers `maximum` to the largest observed channel value when that value is
/// close enough to it.
///
/// Returns whether `maximum` changed. A threshold below 0.00001 disables the
/// adjustment and one above 0.99999 selects [`DEFAULT_ADJUST_MAXIMUM_THRESHOLD`].
pub fn adjust_maximum(color: &mut ColorState, threshold: f32) -> bool {
    if threshold < 0.00001 {
        return false;
    }
    let threshold = if threshold > 0.99999 {
        DEFAULT_ADJUST_MAXIMUM_THRESHOLD
    } else {
        threshold
    };

    let real_max = color.real_maximum();
    if real_max > 0 && real_max < color.maximum && real_max as f32 > color.maximum as f32 * threshold {
        debug!(from = color.maximum, to = real_max, "Adjusted maximum");
        color.maximum = real_max;
        return true;
    }
    false
}

/// Applies `f` to the sample of every photosite, in the channel its filter color
/// selects, and returns the resulting channel maxima.
fn map_photosites<F>(image: &mut ImageBuffer, geometry: &SensorGeometry, shrink: bool, f: F) -> [u32; 4]
where
    F: Fn(usize, usize, u16) -> u16 + Sync,
{
    let s = shrink as usize;
    let width = image.width.max(1);
    image
        .pixels
        .par_chunks_mut(width)
        .enumerate()
        .map(|(dest_row, dst)| {
            let mut max = [0u32; 4];
            let last = ((dest_row + 1) << s).min(geometry.height);
            for row in (dest_row << s)..last {
                for col in 0..geometry.width {
                    let cc = geometry.filters.color(row, col);
                    let px = &mut dst[col >> s][cc];
                    *px = f(row, col, *px);
                    max[cc] = max[cc].max(*px as u32);
                }
            }
            max
        })
        .reduce(|| [0; 4], merge_maximum)
}

/// Like [`map_photosites`] but only the channel is passed on. Images without a
/// mosaic get every channel of every pixel mapped.
fn map_channels<F>(image: &mut ImageBuffer, geometry: &SensorGeometry, shrink: bool, f: F) -> [u32; 4]
where
    F: Fn(usize, u16) -> u16 + Sync,
{
    if geometry.filters.is_mosaic() {
        return map_photosites(image, geometry, shrink, |row, col, value| {
            f(geometry.filters.color(row, col), value)
        });
    }
    let width = image.width.max(1);
    image
        .pixels
        .par_chunks_mut(width)
        .map(|row| {
            let mut max = [0u32; 4];
            for px in row {
                for (cc, value) in px.iter_mut().enumerate() {
                    *value = f(cc, *value);
                    max[cc] = max[cc].max(*value as u32);
                }
            }
            max
        })
        .reduce(|| [0; 4], merge_maximum)
}

fn merge_maximum(a: [u32; 4], b: [u32; 4]) -> [u32; 4] {
    std::array::from_fn(|c| a[c].max(b[c]))
}
