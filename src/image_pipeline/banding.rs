//! Row and column banding removal for 2x2 Bayer data.
//!
//! The mosaic is scaled to use the full 16-bit range, split into a four level
//! low-pass pyramid and, for every level, a smoothed laplacian energy. Each
//! photosite contributes its band-pass differences weighted by how flat its
//! neighbourhood is, those contributions are averaged per Bayer row and per Bayer
//! column, and the zero-mean averages are subtracted from the data.

mod filters;
mod planes;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::geometry::SensorGeometry;

use filters::{binomial, block, green_blur};
use planes::{GreenMode, QuadPlanes};

const LEVELS: usize = 4;
const MIN_EXTENT: usize = 128;

/// Inverse filter energies of successive pyramid levels, for non-green and green photosites.
const ENERGY_MULT: [f32; LEVELS] = [1.560976, 8.196011, 180.413773, (3601.427246f64 / 3.0) as f32];
const ENERGY_MULT_GREEN: [f32; LEVELS] = [1.235223, 19.813868, 365.148407, (7208.362793f64 / 3.0) as f32];

const PYRAMID_RADII: [[usize; 3]; LEVELS - 1] = [[3, 3, 3], [14, 14, 14], [45, 45, 45]];
const ENERGY_RADII: [[usize; 2]; LEVELS] = [[32, 32], [56, 56], [90, 90], [104, 104]];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandingOptions {
    /// Noise thresholds per color channel, in sensor units.
    pub thresholds: [f32; 4],
}

impl Default for BandingOptions {
    fn default() -> Self {
        Self { thresholds: [0.0; 4] }
    }
}

/// Outcome of a banding pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandingStatus {
    Corrected,
    /// The filter pattern does not repeat every 2x2 photosites.
    NotApplicable,
    /// Fewer than 128 rows or columns.
    TooSmall,
}

#[derive(Debug, Clone)]
pub struct BandingFilter {
    options: BandingOptions,
}

impl BandingFilter {
    pub fn new(options: BandingOptions) -> Self {
        Self { options }
    }

    /// Removes banding from the mosaic in `image` in place.
    ///
    /// Preconditions that are not met are reported through the returned status and
    /// leave the image untouched.
    #[instrument(skip_all, fields(width = geometry.width, height = geometry.height))]
    pub fn apply(
        &self,
        image: &mut ImageBuffer,
        geometry: &SensorGeometry,
        shrink: bool,
    ) -> Result<BandingStatus, Fault> {
        if geometry.width < MIN_EXTENT || geometry.height < MIN_EXTENT {
            debug!("Image too small for banding removal");
            return Ok(BandingStatus::TooSmall);
        }
        if !geometry.filters.is_bayer_2x2() {
            debug!(filters = ?geometry.filters, "Banding removal needs a 2x2 mosaic");
            return Ok(BandingStatus::NotApplicable);
        }
        if image.width != geometry.iwidth || image.height != geometry.iheight {
            return Err(Fault::DecodeRaw("image does not match sensor geometry".to_string()));
        }

        let mut mosaic = QuadPlanes::from_image(image, geometry, shrink)?;
        let val_max = mosaic.maximum();
        if val_max == 0 {
            return Ok(BandingStatus::Corrected);
        }
        let shift = val_max.leading_zeros();
        for plane in &mut mosaic.planes {
            plane.data.par_iter_mut().for_each(|v| *v <<= shift);
        }
        let val_max = val_max << shift;

        let greens = GreenMode::detect(geometry);
        let pyramid = build_pyramid(&mosaic, greens)?;
        let energies = laplacian_energy(&mosaic, &pyramid, greens)?;

        let thresholds: [f32; 4] =
            std::array::from_fn(|i| self.options.thresholds[geometry.filters.color(i >> 1, i & 1)]);
        let largest = thresholds.iter().copied().fold(f32::MIN, f32::max);
        let accepted = (val_max as f32 - 3.0 * largest) as i64;
        let scale = (1u32 << shift) as f32;
        let weights = WeightTable::new(thresholds.map(|t| t * scale))?;

        let offsets = BandOffsets::estimate(&mosaic, &pyramid, &energies, &weights);
        debug!(shift, accepted, "Estimated banding offsets");

        let correct = |row: usize, col: usize| -> u16 {
            let i = ((row & 1) << 1) | (col & 1);
            let sample = mosaic.get(row, col) as i64;
            if sample >= accepted {
                return (sample >> shift) as u16;
            }
            let corrected = sample - offsets.rows[row >> 1][i] as i64 - offsets.cols[col >> 1][i] as i64;
            (corrected.clamp(0, val_max as i64) >> shift) as u16
        };

        let s = shrink as usize;
        let image_width = image.width.max(1);
        image.pixels.par_chunks_mut(image_width).enumerate().for_each(|(dest_row, dst)| {
            let last = ((dest_row + 1) << s).min(geometry.height);
            for row in (dest_row << s)..last {
                for col in 0..geometry.width {
                    dst[col >> s][geometry.filters.color(row, col)] = correct(row, col);
                }
            }
        });
        Ok(BandingStatus::Corrected)
    }
}

/// Level 0 is a light blur of the (green smoothed) mosaic, the coarser levels
/// are increasingly wide box approximations of a gaussian applied to level 0.
fn build_pyramid(mosaic: &QuadPlanes, greens: Option<GreenMode>) -> Result<[QuadPlanes; LEVELS], Fault> {
    let base = match greens {
        Some(mode) => green_blur(mosaic, mode)?,
        None => mosaic.try_clone()?,
    };
    let level0 = binomial(&base, 1)?;
    let [r1, r2, r3] = &PYRAMID_RADII;
    let level1 = block(&level0, r1)?;
    let level2 = block(&level0, r2)?;
    let level3 = block(&level0, r3)?;
    Ok([level0, level1, level2, level3])
}

/// Squared band-pass response of every level, normalized by the level's filter
/// energy and saturated at 65535, then smoothed.
fn laplacian_energy(
    mosaic: &QuadPlanes,
    pyramid: &[QuadPlanes; LEVELS],
    greens: Option<GreenMode>,
) -> Result<Vec<QuadPlanes>, Fault> {
    let mut energies = Vec::with_capacity(LEVELS);
    for level in 0..LEVELS {
        let finer = if level == 0 { mosaic } else { &pyramid[level - 1] };
        let coarser = &pyramid[level];
        let mut energy = QuadPlanes::new(mosaic.width, mosaic.height)?;
        for (i, plane) in energy.planes.iter_mut().enumerate() {
            let mult = match greens {
                Some(mode) if mode.is_green_plane(i) => ENERGY_MULT_GREEN[level],
                _ => ENERGY_MULT[level],
            };
            let limit = (65535.0 / mult) as i64;
            let (finer, coarser) = (&finer.planes[i].data, &coarser.planes[i].data);
            plane.data.par_iter_mut().enumerate().for_each(|(k, value)| {
                let dif = finer[k] as i64 - coarser[k] as i64;
                let dif = dif * dif;
                *value = if dif < limit { (dif as f32 * mult) as u16 } else { u16::MAX };
            });
        }
        if let Some(mode) = greens {
            energy = green_blur(&energy, mode)?;
        }
        energies.push(block(&energy, &ENERGY_RADII[level])?);
    }
    Ok(energies)
}

/// Confidence that a photosite sits in a flat area, indexed by smoothed energy.
///
/// Energies below `t²` weigh 1, the weight then falls linearly to 0 at `1.2 t²`.
struct WeightTable {
    tables: [Vec<f32>; 4],
}

impl WeightTable {
    fn new(thresholds: [f32; 4]) -> Result<Self, Fault> {
        let table = |t: f32| -> Result<Vec<f32>, Fault> {
            let t2 = t * t;
            let mut weights = try_filled(65536, 0.0f32)?;
            for (v, w) in weights.iter_mut().enumerate() {
                let v = v as f32;
                *w = if v < t2 {
                    1.0
                } else if v * 5.0 < 6.0 * t2 {
                    6.0 - 5.0 * v / t2
                } else {
                    0.0
                };
            }
            Ok(weights)
        };
        let [t0, t1, t2, t3] = thresholds;
        Ok(Self { tables: [table(t0)?, table(t1)?, table(t2)?, table(t3)?] })
    }

    #[inline]
    fn weight(&self, plane: usize, energy: u16) -> f32 {
        self.tables[plane][energy as usize]
    }
}

/// Integer offsets per Bayer row and per Bayer column, per sub-plane.
struct BandOffsets {
    rows: Vec<[i32; 4]>,
    cols: Vec<[i32; 4]>,
}

impl BandOffsets {
    fn estimate(
        mosaic: &QuadPlanes,
        pyramid: &[QuadPlanes; LEVELS],
        energies: &[QuadPlanes],
        weights: &WeightTable,
    ) -> Self {
        let bayer_rows = mosaic.height.div_ceil(2);
        let bayer_cols = mosaic.width.div_ceil(2);

        // Per cell (weighted estimate, weight) for every sub-plane; absent cells stay zero.
        let cells: Vec<[(f32, f32); 4]> = (0..bayer_rows * bayer_cols)
            .into_par_iter()
            .map(|cell| {
                let (pr, pc) = (cell / bayer_cols, cell % bayer_cols);
                std::array::from_fn(|i| {
                    let plane = &mosaic.planes[i];
                    if pr >= plane.height || pc >= plane.width {
                        return (0.0, 0.0);
                    }
                    let k = pr * plane.width + pc;
                    let mut finer = plane.data[k] as f32;
                    let (mut bsum, mut wsum) = (0.0f32, 0.0f32);
                    for level in 0..LEVELS {
                        let coarser = pyramid[level].planes[i].data[k] as f32;
                        let w = weights.weight(i, energies[level].planes[i].data[k]);
                        wsum += w;
                        bsum += w * (finer - coarser);
                        finer = coarser;
                    }
                    let wsum = wsum * wsum;
                    (bsum * wsum, wsum)
                })
            })
            .collect();

        let row_sums: Vec<[(f32, f32); 4]> = cells
            .par_chunks(bayer_cols.max(1))
            .map(|line| accumulate(line.iter()))
            .collect();
        let col_sums: Vec<[(f32, f32); 4]> = (0..bayer_cols)
            .into_par_iter()
            .map(|pc| accumulate(cells.iter().skip(pc).step_by(bayer_cols.max(1))))
            .collect();

        let plane_heights = mosaic.planes.each_ref().map(|p| p.height);
        let plane_widths = mosaic.planes.each_ref().map(|p| p.width);
        Self {
            rows: zero_mean(&row_sums, plane_heights, true),
            cols: zero_mean(&col_sums, plane_widths, false),
        }
    }
}

fn accumulate<'a>(cells: impl Iterator<Item = &'a [(f32, f32); 4]>) -> [(f32, f32); 4] {
    let mut total = [(0.0f32, 0.0f32); 4];
    for cell in cells {
        for (acc, &(value, weight)) in total.iter_mut().zip(cell) {
            acc.0 += value;
            acc.1 += weight;
        }
    }
    total
}

/// Weighted means minus their average over the `extent[i]` lines that exist
/// for sub-plane `i`, truncated toward zero.
///
/// Lines without any weight keep offset zero unless `fill_unweighted` is set,
/// in which case they receive the negated average like every other line.
fn zero_mean(sums: &[[(f32, f32); 4]], extent: [usize; 4], fill_unweighted: bool) -> Vec<[i32; 4]> {
    let mut offsets = vec![[0i32; 4]; sums.len()];
    for i in 0..4 {
        let lines = extent[i].min(sums.len());
        let means: Vec<f32> = sums[..lines]
            .iter()
            .map(|s| if s[i].1 > 0.0 { s[i].0 / s[i].1 } else { 0.0 })
            .collect();
        if lines == 0 {
            continue;
        }
        let average = means.iter().sum::<f32>() / lines as f32;
        for (line, mean) in means.iter().enumerate() {
            if fill_unweighted || sums[line][i].1 > 0.0 {
                offsets[line][i] = (mean - average) as i32;
            }
        }
    }
    offsets
}
