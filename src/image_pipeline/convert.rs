//! Raw buffer to canonical image conversion.
//!
//! One pass per layout class turns whatever the decoder produced into the
//! 4-channel interleaved image every later stage works on. Cropping adjusts the
//! geometry before the pass; diagonal sensors are derotated during it.

mod fuji;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::{BufferManager, ImageBuffer};
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::filters::FilterPattern;
use crate::image_pipeline::raw::geometry::{CropBox, SensorGeometry};
use crate::image_pipeline::raw::types::{DecoderDescriptor, LayoutClass, RawBuffer};

/// Crop origin actually applied, in sensor coordinates relative to the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropOrigin {
    pub left: usize,
    pub top: usize,
}

/// Clamps `crop` to the sensor and applies it to `geometry`.
///
/// Margins move by the crop origin, the visible size becomes the crop extent and,
/// for mosaic sensors that are not diagonal, the filter pattern is re-phased so that
/// cropped coordinates keep their original colors.
pub fn apply_crop(
    geometry: &mut SensorGeometry,
    crop: CropBox,
    shrink: bool,
) -> Result<CropOrigin, Fault> {
    let mut left = crop.left.max(0);
    let mut top = crop.top.max(0);
    if geometry.is_diagonal() {
        left = left / 4 * 4;
        top = top / 4 * 4;
    }
    let width = crop.width.min(geometry.width as i64 - left);
    let height = crop.height.min(geometry.height as i64 - top);
    if width <= 0 || height <= 0 {
        return Err(Fault::BadCrop);
    }

    let (left, top) = (left as usize, top as usize);
    geometry.left_margin += left;
    geometry.top_margin += top;
    geometry.width = width as usize;
    geometry.height = height as usize;
    geometry.apply_shrink(shrink);

    if !geometry.is_diagonal() && geometry.filters.is_mosaic() {
        geometry.filters = geometry.filters.shifted(top, left);
    }
    if let Some(diagonal) = geometry.diagonal.as_mut() {
        diagonal.fuji_width = geometry.width >> (!diagonal.fuji_layout as usize);
        diagonal.fwidth = (geometry.height >> (diagonal.fuji_layout as usize)) + diagonal.fuji_width;
        diagonal.fheight = diagonal.fwidth.saturating_sub(1);
    }
    debug!(left, top, width, height, "Applied crop box");
    Ok(CropOrigin { left, top })
}

/// Builds the canonical image from the session's raw buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawToImageConverter {
    shrink: bool,
    crop: Option<CropBox>,
    derotate: bool,
}

impl RawToImageConverter {
    pub fn new(shrink: bool) -> Self {
        Self { shrink, crop: None, derotate: false }
    }

    pub fn with_crop(mut self, crop: Option<CropBox>) -> Self {
        self.crop = crop;
        self
    }

    /// Derotate diagonal sensors during the copy.
    pub fn with_derotation(mut self, derotate: bool) -> Self {
        self.derotate = derotate;
        self
    }

    #[instrument(skip_all, fields(layout = ?descriptor.layout, shrink = self.shrink))]
    pub fn convert(
        &self,
        buffers: &mut BufferManager,
        geometry: &mut SensorGeometry,
        color: &mut ColorState,
        descriptor: &DecoderDescriptor,
    ) -> Result<(), Fault> {
        let uncropped = geometry.filters;
        let origin = match self.crop {
            Some(crop) => apply_crop(geometry, crop, self.shrink)?,
            None => CropOrigin::default(),
        };

        if self.derotate && geometry.is_diagonal() {
            return fuji::derotate(buffers, geometry, color, self.shrink);
        }

        let (width, height) = (geometry.iwidth, geometry.iheight);
        let (raw, image) = buffers.raw_and_image(width, height)?;
        check_extent(raw, geometry, descriptor.layout)?;

        match (descriptor.layout, raw) {
            (LayoutClass::FlatfieldBayer, RawBuffer::Bayer { data, width: stride, .. }) => {
                copy_flatfield(data, *stride, geometry, self.shrink, image, RowColors::Cached);
            }
            (LayoutClass::FlatfieldBayer2, RawBuffer::Bayer { data, width: stride, .. }) => {
                copy_flatfield(data, *stride, geometry, self.shrink, image, RowColors::PerPixel);
            }
            (LayoutClass::FourComponent, RawBuffer::FourComponent { data, width: stride, .. }) => {
                copy_four_component(data, *stride, geometry, self.shrink, uncropped, origin, image);
            }
            (LayoutClass::Legacy, RawBuffer::Legacy { data, width: stride, .. }) => {
                copy_legacy(data, *stride, geometry, origin, image)?;
            }
            (layout, _) => {
                return Err(Fault::DecodeRaw(format!("raw buffer does not match {layout:?} layout")));
            }
        }
        debug!(width, height, "Raw data converted to image");
        Ok(())
    }
}

/// Checks that the visible window plus margins lies inside the raw buffer.
fn check_extent(raw: &RawBuffer, geometry: &SensorGeometry, layout: LayoutClass) -> Result<(), Fault> {
    let (need_w, need_h) = match layout {
        LayoutClass::Legacy => (geometry.width, geometry.height),
        _ => (geometry.left_margin + geometry.width, geometry.top_margin + geometry.height),
    };
    if need_w > raw.width() || need_h > raw.height() {
        return Err(Fault::DecodeRaw(format!(
            "visible area {need_w}x{need_h} exceeds raw buffer {}x{}",
            raw.width(),
            raw.height()
        )));
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum RowColors {
    /// Colors of one column period computed once per row.
    Cached,
    PerPixel,
}

/// Source rows that land in destination row `dest_row`.
fn source_rows(dest_row: usize, shrink: bool, height: usize) -> std::ops::Range<usize> {
    let s = shrink as usize;
    let first = dest_row << s;
    first..((dest_row + 1) << s).min(height)
}

fn copy_flatfield(
    raw: &[u16],
    stride: usize,
    geometry: &SensorGeometry,
    shrink: bool,
    image: &mut ImageBuffer,
    lookup: RowColors,
) {
    let s = shrink as usize;
    let pattern = geometry.filters;
    let period = pattern.column_period();
    image
        .pixels
        .par_chunks_mut(geometry.iwidth.max(1))
        .enumerate()
        .for_each(|(dest_row, dst)| {
            for row in source_rows(dest_row, shrink, geometry.height) {
                let base = (row + geometry.top_margin) * stride + geometry.left_margin;
                let src = &raw[base..base + geometry.width];
                match lookup {
                    RowColors::Cached => {
                        let colors: Vec<usize> = (0..period).map(|k| pattern.color(row, k)).collect();
                        for (col, &value) in src.iter().enumerate() {
                            dst[col >> s][colors[col % period]] = value;
                        }
                    }
                    RowColors::PerPixel => {
                        for (col, &value) in src.iter().enumerate() {
                            dst[col >> s][pattern.color(row, col)] = value;
                        }
                    }
                }
            }
        });
}

fn copy_four_component(
    raw: &[[u16; 4]],
    stride: usize,
    geometry: &SensorGeometry,
    shrink: bool,
    uncropped: FilterPattern,
    origin: CropOrigin,
    image: &mut ImageBuffer,
) {
    let s = shrink as usize;
    image
        .pixels
        .par_chunks_mut(geometry.iwidth.max(1))
        .enumerate()
        .for_each(|(dest_row, dst)| {
            for row in source_rows(dest_row, shrink, geometry.height) {
                let base = (row + geometry.top_margin) * stride + geometry.left_margin;
                let src = &raw[base..base + geometry.width];
                if shrink {
                    for (col, cell) in src.iter().enumerate() {
                        let cc = geometry.filters.color(row, col);
                        let authoritative = uncropped.color(row + origin.top, col + origin.left);
                        dst[col >> s][cc] = cell[authoritative];
                    }
                } else {
                    dst[..geometry.width].copy_from_slice(src);
                }
            }
        });
}

fn copy_legacy(
    raw: &[[u16; 4]],
    stride: usize,
    geometry: &SensorGeometry,
    origin: CropOrigin,
    image: &mut ImageBuffer,
) -> Result<(), Fault> {
    let width = geometry.width.min(image.width);
    image
        .pixels
        .par_chunks_mut(image.width.max(1))
        .enumerate()
        .try_for_each(|(row, dst)| {
            let base = (row + origin.top) * stride + origin.left;
            let src = raw.get(base..base + width).ok_or_else(|| {
                Fault::DecodeRaw(format!("legacy raw row {row} lies outside the {} cell buffer", raw.len()))
            })?;
            dst[..width].copy_from_slice(src);
            Ok(())
        })
}
