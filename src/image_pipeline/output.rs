//! Rendering of the processed image into an interleaved 8 or 16-bit bitmap.

mod gamma;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::common::error::Fault;

pub use gamma::{HISTOGRAM_SIZE, auto_white, gamma_curve};

/// Size and layout of the bitmap [`render`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemImageFormat {
    pub width: usize,
    pub height: usize,
    pub colors: usize,
    pub bps: u8,
}

impl MemImageFormat {
    /// Output size for an image of `width x height` under dcraw orientation `flip`.
    pub fn new(width: usize, height: usize, flip: u8, colors: usize, bps: u8) -> Self {
        let (width, height) = if flip & 4 != 0 { (height, width) } else { (width, height) };
        Self { width, height, colors: if colors == 1 { 1 } else { 3 }, bps: if bps == 16 { 16 } else { 8 } }
    }

    pub fn stride(&self) -> usize {
        self.width * self.colors * (self.bps as usize / 8)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Eight(Vec<u8>),
    Sixteen(Vec<u16>),
}

/// Interleaved bitmap, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub width: usize,
    pub height: usize,
    pub colors: usize,
    pub samples: Samples,
}

impl ProcessedImage {
    pub fn bits(&self) -> u8 {
        match self.samples {
            Samples::Eight(_) => 8,
            Samples::Sixteen(_) => 16,
        }
    }
}

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub flip: u8,
    pub colors: usize,
    pub bps: u8,
    pub bgr: bool,
    /// Gamma exponent and toe slope.
    pub gamma: [f64; 2],
    pub bright: f32,
    /// Scale to the 99th percentile instead of the fixed white point.
    pub auto_bright: bool,
    /// Diagonal sensors leave half of the derotated frame empty.
    pub half_percentile: bool,
}

/// Maps output position `(row, col)` back to an image index.
#[inline]
fn flip_index(image: &ImageBuffer, flip: u8, row: usize, col: usize) -> usize {
    let (mut row, mut col) = if flip & 4 != 0 { (col, row) } else { (row, col) };
    if flip & 2 != 0 {
        row = image.height - 1 - row;
    }
    if flip & 1 != 0 {
        col = image.width - 1 - col;
    }
    row * image.width + col
}

fn histogram(image: &ImageBuffer, colors: usize) -> Vec<Vec<u32>> {
    image
        .pixels
        .par_chunks(image.width.max(1))
        .fold(
            || vec![vec![0u32; HISTOGRAM_SIZE]; colors],
            |mut hist, row| {
                for px in row {
                    for (c, channel) in hist.iter_mut().enumerate() {
                        channel[(px[c] >> 3) as usize] += 1;
                    }
                }
                hist
            },
        )
        .reduce(
            || vec![vec![0u32; HISTOGRAM_SIZE]; colors],
            |mut a, b| {
                for (ca, cb) in a.iter_mut().zip(&b) {
                    for (x, y) in ca.iter_mut().zip(cb) {
                        *x += y;
                    }
                }
                a
            },
        )
}

/// Applies the tone curve and orientation to `image`.
#[instrument(skip_all, fields(width = image.width, height = image.height, bps = settings.bps))]
pub fn render(image: &ImageBuffer, settings: &RenderSettings) -> Result<ProcessedImage, Fault> {
    let format = MemImageFormat::new(image.width, image.height, settings.flip, settings.colors, settings.bps);
    let channels = format.colors;

    let white = if settings.auto_bright {
        let mut pixels = image.width * image.height;
        if settings.half_percentile {
            pixels /= 2;
        }
        auto_white(&histogram(image, channels), pixels)
    } else {
        0x2000 << 3
    };
    let white = (white as f32 / settings.bright.max(f32::EPSILON)) as u32;
    let curve = gamma_curve(settings.gamma[0], settings.gamma[1], white);
    debug!(white, "Rendering with tone curve");

    let order: [usize; 3] = if settings.bgr { [2, 1, 0] } else { [0, 1, 2] };
    let row_len = format.width * channels;
    let pick = |row: usize, col: usize, k: usize| -> u16 {
        let px = image.pixels[flip_index(image, settings.flip, row, col)];
        let c = if channels == 1 { 0 } else { order[k] };
        curve[px[c] as usize]
    };

    let samples = if format.bps == 16 {
        let mut data = try_filled(row_len * format.height, 0u16)?;
        data.par_chunks_mut(row_len.max(1)).enumerate().for_each(|(row, line)| {
            for (i, out) in line.iter_mut().enumerate() {
                *out = pick(row, i / channels, i % channels);
            }
        });
        Samples::Sixteen(data)
    } else {
        let mut data = try_filled(row_len * format.height, 0u8)?;
        data.par_chunks_mut(row_len.max(1)).enumerate().for_each(|(row, line)| {
            for (i, out) in line.iter_mut().enumerate() {
                *out = (pick(row, i / channels, i % channels) >> 8) as u8;
            }
        });
        Samples::Eight(data)
    };

    Ok(ProcessedImage { width: format.width, height: format.height, colors: channels, samples })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(flip: u8, bps: u8) -> RenderSettings {
        RenderSettings {
            flip,
            colors: 3,
            bps,
            bgr: false,
            // identity curve up to the white point
            gamma: [1.0, 1.0],
            bright: 1.0,
            auto_bright: false,
            half_percentile: false,
        }
    }

    /// 3x2 image whose red channel holds its pixel index times 1024.
    fn indexed() -> ImageBuffer {
        let pixels = (0..6u16).map(|i| [i * 1024, 0, 7 * 1024, 0]).collect();
        ImageBuffer { width: 3, height: 2, pixels }
    }

    fn reds(image: &ProcessedImage) -> Vec<u16> {
        match &image.samples {
            Samples::Sixteen(data) => data.chunks(3).map(|px| px[0] / 1024).collect(),
            Samples::Eight(data) => data.chunks(3).map(|px| px[0] as u16 / 4).collect(),
        }
    }

    #[test]
    fn test_format_swaps_on_transpose() {
        let format = MemImageFormat::new(6, 4, 5, 3, 8);
        assert_eq!((format.width, format.height), (4, 6));
        assert_eq!(format.stride(), 12);
        assert_eq!(MemImageFormat::new(6, 4, 3, 4, 16).colors, 3);
    }

    #[test]
    fn test_orientations() {
        let image = indexed();
        let plain = render(&image, &settings(0, 16)).unwrap();
        assert_eq!(reds(&plain), vec![0, 1, 2, 3, 4, 5]);

        let rotated = render(&image, &settings(3, 16)).unwrap();
        assert_eq!(reds(&rotated), vec![5, 4, 3, 2, 1, 0]);

        let transposed = render(&image, &settings(6, 16)).unwrap();
        assert_eq!((transposed.width, transposed.height), (2, 3));
        // 90 degrees clockwise
        assert_eq!(reds(&transposed), vec![3, 0, 4, 1, 5, 2]);
    }

    #[test]
    fn test_eight_bit_and_bgr() {
        let image = indexed();
        let mut s = settings(0, 8);
        s.bgr = true;
        let out = render(&image, &s).unwrap();
        assert_eq!(out.bits(), 8);
        let Samples::Eight(data) = &out.samples else { panic!("expected 8-bit samples") };
        // blue first
        assert_eq!(data[0], 28);
        assert_eq!(data[5], 4);
    }

    #[test]
    fn test_gray_uses_first_channel() {
        let image = indexed();
        let mut s = settings(0, 16);
        s.colors = 1;
        let out = render(&image, &s).unwrap();
        assert_eq!(out.colors, 1);
        let Samples::Sixteen(data) = &out.samples else { panic!("expected 16-bit samples") };
        assert_eq!(data.len(), 6);
        assert_eq!(data[5], 5 * 1024);
    }
}
