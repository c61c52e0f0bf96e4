//! Reference processing strategies.

use anyhow::{Result, bail};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::debayer::CpuDebayer;
use crate::image_pipeline::raw::filters::FilterPattern;
use crate::image_pipeline::strategies::{ProcessingStrategies, StageContext, resample};

/// Bilinear demosaic, plain white balance and resampling, without color
/// management.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStrategies;

impl StandardStrategies {
    pub fn new() -> Self {
        Self
    }
}

fn check_extent(ctx: &StageContext) -> Result<()> {
    let g = &*ctx.geometry;
    if ctx.image.width != g.iwidth || ctx.image.height != g.iheight {
        bail!(
            "image is {}x{}, geometry expects {}x{}",
            ctx.image.width,
            ctx.image.height,
            g.iwidth,
            g.iheight
        );
    }
    Ok(())
}

/// Fills every missing color of a pixel with the mean of the 3x3 neighbours
/// carrying it. Used for mosaics that do not repeat every 2x2 photosites.
fn neighbour_interpolate(image: &mut ImageBuffer, filters: FilterPattern, colors: usize) -> Result<()> {
    let (width, height) = (image.width, image.height);
    let mut source = try_filled(image.pixels.len(), [0u16; 4])?;
    source.copy_from_slice(&image.pixels);

    image.pixels.par_chunks_mut(width.max(1)).enumerate().for_each(|(row, line)| {
        for (col, px) in line.iter_mut().enumerate() {
            let own = filters.color(row, col);
            let mut sum = [0u32; 4];
            let mut count = [0u32; 4];
            for r in row.saturating_sub(1)..(row + 2).min(height) {
                for c in col.saturating_sub(1)..(col + 2).min(width) {
                    let color = filters.color(r, c);
                    sum[color] += source[r * width + c][color] as u32;
                    count[color] += 1;
                }
            }
            for color in 0..colors.min(4) {
                if color != own && count[color] > 0 {
                    px[color] = (sum[color] / count[color]) as u16;
                }
            }
        }
    });
    Ok(())
}

impl ProcessingStrategies for StandardStrategies {
    fn remove_zeroes(&self, ctx: &mut StageContext) -> Result<()> {
        check_extent(ctx)?;
        let g = &*ctx.geometry;
        if !g.filters.is_mosaic() {
            return Ok(());
        }
        let shrink = ctx.state.shrink;
        let pixels = &mut ctx.image.pixels;
        let mut fixed = 0usize;

        for row in 0..g.height {
            for col in 0..g.width {
                let c = g.filters.color(row, col);
                let idx = g.pixel_index(row, col, shrink);
                if pixels[idx][c] != 0 {
                    continue;
                }
                let (mut total, mut n) = (0u32, 0u32);
                for r in row.saturating_sub(2)..(row + 3).min(g.height) {
                    for cc in col.saturating_sub(2)..(col + 3).min(g.width) {
                        if g.filters.color(r, cc) != c {
                            continue;
                        }
                        let value = pixels[g.pixel_index(r, cc, shrink)][c];
                        if value != 0 {
                            total += value as u32;
                            n += 1;
                        }
                    }
                }
                if n > 0 {
                    pixels[idx][c] = (total / n) as u16;
                    fixed += 1;
                }
            }
        }
        debug!(fixed, "Replaced zero photosites");
        Ok(())
    }

    #[instrument(skip_all)]
    fn scale_colors(&self, ctx: &mut StageContext) -> Result<()> {
        let mut pre_mul = ctx.color.multipliers.map(|m| if m > 0.0 { m } else { 1.0 });
        if ctx.geometry.colors == 3 {
            pre_mul[3] = pre_mul[1];
        }
        let dmin = pre_mul.iter().copied().fold(f32::MAX, f32::min);
        let dmax = if ctx.options.highlight != 0 {
            pre_mul.iter().copied().fold(0.0, f32::max)
        } else {
            dmin
        };
        let range = ctx.color.maximum.saturating_sub(ctx.color.black).max(1) as f32;
        let scale: [f32; 4] = std::array::from_fn(|c| pre_mul[c] / dmax * 65535.0 / range);
        debug!(?scale, "Scaling colors");

        ctx.image.pixels.par_iter_mut().for_each(|px| {
            for (value, mul) in px.iter_mut().zip(scale) {
                *value = (*value as f32 * mul).clamp(0.0, 65535.0) as u16;
            }
        });
        Ok(())
    }

    #[instrument(skip_all, fields(shrink = ctx.state.shrink, half_size = ctx.options.half_size))]
    fn pre_interpolate(&self, ctx: &mut StageContext) -> Result<()> {
        let half_size = ctx.options.half_size;

        if ctx.state.shrink {
            if half_size {
                ctx.geometry.height = ctx.geometry.iheight;
                ctx.geometry.width = ctx.geometry.iwidth;
            } else {
                // Spread the decimated mosaic back over the full sensor lattice
                let g = &mut *ctx.geometry;
                let (width, height, iwidth) = (g.width, g.height, g.iwidth);
                let mut expanded = try_filled(width * height, [0u16; 4])?;
                let shrunk = &ctx.image.pixels;
                let filters = g.filters;
                expanded.par_chunks_mut(width.max(1)).enumerate().for_each(|(row, line)| {
                    for (col, px) in line.iter_mut().enumerate() {
                        let c = filters.color(row, col);
                        px[c] = shrunk[(row >> 1) * iwidth + (col >> 1)][c];
                    }
                });
                *ctx.image = ImageBuffer { width, height, pixels: expanded };
                ctx.state.shrink = false;
                g.apply_shrink(false);
            }
        }

        let g = &mut *ctx.geometry;
        if g.filters.is_mosaic() && g.colors == 3 {
            ctx.state.mix_green = ctx.state.four_color_rgb ^ half_size;
            if ctx.state.four_color_rgb || half_size {
                g.colors += 1;
            } else {
                let (filters, width) = (g.filters, ctx.image.width);
                ctx.image.pixels.par_chunks_mut(width.max(1)).enumerate().for_each(|(row, line)| {
                    for (col, px) in line.iter_mut().enumerate() {
                        if filters.color(row, col) == 3 {
                            px[1] = px[3];
                        }
                    }
                });
                g.filters = filters.merge_greens();
            }
        }
        if half_size {
            g.filters = FilterPattern::None;
        }
        debug!(colors = g.colors, mix_green = ctx.state.mix_green, "Pre-interpolation done");
        Ok(())
    }

    fn interpolate(&self, ctx: &mut StageContext) -> Result<()> {
        let filters = ctx.geometry.filters;
        if !filters.is_mosaic() {
            debug!("No mosaic left to interpolate");
            return Ok(());
        }
        debug!(quality = ctx.state.quality, "Bilinear interpolation");
        if filters.is_bayer_2x2() {
            CpuDebayer::new()?.process(&mut *ctx.image, filters)
        } else {
            neighbour_interpolate(&mut *ctx.image, filters, ctx.geometry.colors)
        }
    }

    fn fuji_rotate(&self, ctx: &mut StageContext) -> Result<()> {
        resample::fuji_rotate(ctx)
    }

    fn convert_to_rgb(&self, ctx: &mut StageContext) -> Result<()> {
        let g = &mut *ctx.geometry;
        if ctx.state.document_mode && g.filters.is_mosaic() {
            let (filters, width) = (g.filters, ctx.image.width);
            ctx.image.pixels.par_chunks_mut(width.max(1)).enumerate().for_each(|(row, line)| {
                for (col, px) in line.iter_mut().enumerate() {
                    px[0] = px[filters.color(row, col)];
                }
            });
            g.colors = 1;
            return Ok(());
        }
        if g.colors == 4 {
            ctx.image.pixels.par_iter_mut().for_each(|px| {
                px[1] = ((px[1] as u32 + px[3] as u32) >> 1) as u16;
                px[3] = 0;
            });
            g.colors = 3;
        }
        Ok(())
    }

    fn stretch(&self, ctx: &mut StageContext) -> Result<()> {
        resample::stretch(ctx)
    }
}
