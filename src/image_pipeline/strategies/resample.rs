//! Geometric resampling: diagonal sensor derotation and pixel aspect stretch.

use anyhow::{Result, bail};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::strategies::StageContext;

fn blend(a: [u16; 4], b: [u16; 4], frac: f64) -> [f64; 4] {
    std::array::from_fn(|i| a[i] as f64 * (1.0 - frac) + b[i] as f64 * frac)
}

fn replace_image(ctx: &mut StageContext, width: usize, height: usize, pixels: Vec<[u16; 4]>) {
    *ctx.image = ImageBuffer { width, height, pixels };
    let g = &mut *ctx.geometry;
    g.width = width;
    g.height = height;
    g.iwidth = width;
    g.iheight = height;
}

/// Rotates the diagonal lattice by 45 degrees with bilinear sampling.
///
/// Afterwards the layout reports a zero `fuji_width`, which turns further calls
/// into no-ops.
#[instrument(skip_all)]
pub(super) fn fuji_rotate(ctx: &mut StageContext) -> Result<()> {
    let Some(layout) = ctx.geometry.diagonal else {
        return Ok(());
    };
    if layout.fuji_width == 0 {
        return Ok(());
    }
    let shrink = ctx.state.shrink as usize;
    let fuji_width = (layout.fuji_width - 1 + shrink) >> shrink;
    let step = 0.5f64.sqrt();
    let (width, height) = (ctx.image.width, ctx.image.height);
    let wide = (fuji_width as f64 / step) as usize;
    let high = ((height as f64 - fuji_width as f64) / step).max(0.0) as usize;
    if wide == 0 || high == 0 || width < 2 || height < 2 {
        bail!("diagonal layout of width {fuji_width} does not fit a {width}x{height} image");
    }

    let mut rotated = try_filled(wide * high, [0u16; 4])?;
    let source = &ctx.image.pixels;
    rotated.par_chunks_mut(wide).enumerate().for_each(|(row, line)| {
        for (col, px) in line.iter_mut().enumerate() {
            let r = fuji_width as f64 + (row as f64 - col as f64) * step;
            let c = (row + col) as f64 * step;
            if r < 0.0 {
                continue;
            }
            let (ur, uc) = (r as usize, c as usize);
            if ur + 2 > height || uc + 2 > width {
                continue;
            }
            let (fr, fc) = (r - ur as f64, c - uc as f64);
            let base = ur * width + uc;
            let top = blend(source[base], source[base + 1], fc);
            let bottom = blend(source[base + width], source[base + width + 1], fc);
            for i in 0..4 {
                px[i] = (top[i] * (1.0 - fr) + bottom[i] * fr) as u16;
            }
        }
    });

    replace_image(ctx, wide, high, rotated);
    if let Some(diagonal) = ctx.geometry.diagonal.as_mut() {
        diagonal.fuji_width = 0;
    }
    debug!(wide, high, "Rotated diagonal image");
    Ok(())
}

/// Resamples along one axis so that pixels become square.
#[instrument(skip_all, fields(aspect = ctx.geometry.pixel_aspect))]
pub(super) fn stretch(ctx: &mut StageContext) -> Result<()> {
    let aspect = ctx.geometry.pixel_aspect;
    if aspect == 1.0 || aspect <= 0.0 {
        return Ok(());
    }
    let (width, height) = (ctx.image.width, ctx.image.height);
    if width == 0 || height == 0 {
        return Ok(());
    }
    let source = &ctx.image.pixels;

    if aspect < 1.0 {
        let new_height = (height as f64 / aspect) as usize;
        let mut stretched = try_filled(width * new_height, [0u16; 4])?;
        stretched.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
            let rc = row as f64 * aspect;
            let c = (rc as usize).min(height - 1);
            let frac = rc - c as f64;
            let next = if c + 1 < height { c + 1 } else { c };
            for (col, px) in line.iter_mut().enumerate() {
                let mixed = blend(source[c * width + col], source[next * width + col], frac);
                *px = mixed.map(|v| (v + 0.5) as u16);
            }
        });
        replace_image(ctx, width, new_height, stretched);
    } else {
        let new_width = (width as f64 * aspect) as usize;
        let mut stretched = try_filled(new_width * height, [0u16; 4])?;
        stretched.par_chunks_mut(new_width.max(1)).enumerate().for_each(|(row, line)| {
            for (col, px) in line.iter_mut().enumerate() {
                let rc = col as f64 / aspect;
                let c = (rc as usize).min(width - 1);
                let frac = rc - c as f64;
                let next = if c + 1 < width { c + 1 } else { c };
                let mixed = blend(source[row * width + c], source[row * width + next], frac);
                *px = mixed.map(|v| (v + 0.5) as u16);
            }
        });
        replace_image(ctx, new_width, height, stretched);
    }
    ctx.geometry.pixel_aspect = 1.0;
    debug!(width = ctx.image.width, height = ctx.image.height, "Stretched image");
    Ok(())
}
