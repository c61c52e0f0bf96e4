use std::io::Cursor;

use anyhow::{Result, anyhow, bail};
use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::raw::filters::FilterPattern;

/// Bilinear demosaic of a 2x2 mosaic held in a canonical image.
///
/// Each pixel must carry its photosite value in the channel its filter color
/// selects. Afterwards every pixel holds R, G and B; a split second green
/// receives the interpolated green as well.
pub struct CpuDebayer;

impl CpuDebayer {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    /// CFA phase of the top-left 2x2 tile, with both greens treated alike.
    fn cfa(filters: FilterPattern) -> Result<CFA> {
        if !filters.is_bayer_2x2() {
            bail!("demosaic needs a 2x2 mosaic, got {filters:?}");
        }
        let green = |c: usize| c == 1 || c == 3;
        let (first, second) = (filters.color(0, 0), filters.color(0, 1));
        match (first, second) {
            (0, _) => Ok(CFA::RGGB),
            (2, _) => Ok(CFA::BGGR),
            (g, 0) if green(g) => Ok(CFA::GRBG),
            (g, 2) if green(g) => Ok(CFA::GBRG),
            _ => Err(anyhow!("unsupported filter phase {filters:?}")),
        }
    }

    pub fn process(&self, image: &mut ImageBuffer, filters: FilterPattern) -> Result<()> {
        let (width, height) = (image.width, image.height);
        let cfa = Self::cfa(filters)?;
        info!("Starting CPU debayering for image {}x{}", width, height);

        // One little-endian 16-bit sample per photosite
        let bayer_bytes: Vec<u8> = image
            .rows()
            .enumerate()
            .flat_map(|(row, line)| {
                line.iter()
                    .enumerate()
                    .map(move |(col, px)| px[filters.color(row, col)])
            })
            .flat_map(|val| val.to_le_bytes())
            .collect();

        let mut output_buf = vec![0u8; width * height * 3 * 2];
        let mut cursor = Cursor::new(&bayer_bytes[..]);
        debug!(input = bayer_bytes.len(), output = output_buf.len(), "Running demosaic");

        {
            let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
            bayer::run_demosaic(&mut cursor, BayerDepth::Depth16LE, cfa, Demosaic::Linear, &mut output_raster)
                .map_err(|e| anyhow!("Demosaic failed: {:?}", e))?;
        }

        let split_green = (0..2).any(|row| (0..2).any(|col| filters.color(row, col) == 3));
        image
            .pixels
            .par_iter_mut()
            .zip(output_buf.par_chunks_exact(6))
            .for_each(|(px, rgb)| {
                let r = u16::from_le_bytes([rgb[0], rgb[1]]);
                let g = u16::from_le_bytes([rgb[2], rgb[3]]);
                let b = u16::from_le_bytes([rgb[4], rgb[5]]);
                *px = [r, g, b, if split_green { g } else { 0 }];
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mosaic(width: usize, height: usize, filters: FilterPattern, rgb: [u16; 3]) -> ImageBuffer {
        let mut image = ImageBuffer { width, height, pixels: vec![[0; 4]; width * height] };
        for row in 0..height {
            for col in 0..width {
                let c = filters.color(row, col);
                image.pixels[row * width + col][c] = rgb[if c == 3 { 1 } else { c }];
            }
        }
        image
    }

    #[test]
    fn test_cfa_phases() {
        assert!(matches!(CpuDebayer::cfa(FilterPattern::RGGB).unwrap(), CFA::RGGB));
        assert!(matches!(CpuDebayer::cfa(FilterPattern::BGGR).unwrap(), CFA::BGGR));
        assert!(matches!(CpuDebayer::cfa(FilterPattern::GRBG).unwrap(), CFA::GRBG));
        assert!(matches!(CpuDebayer::cfa(FilterPattern::GBRG).unwrap(), CFA::GBRG));
        assert!(CpuDebayer::cfa(FilterPattern::None).is_err());
    }

    #[test]
    fn test_flat_color_is_reconstructed() {
        let mut image = mosaic(8, 6, FilterPattern::RGGB, [1000, 2000, 3000]);
        CpuDebayer::new().unwrap().process(&mut image, FilterPattern::RGGB).unwrap();
        assert!(image.pixels.iter().all(|px| *px == [1000, 2000, 3000, 2000]));
    }

    #[test]
    fn test_merged_greens_leave_fourth_channel_empty() {
        let filters = FilterPattern::GBRG.merge_greens();
        let mut image = mosaic(6, 6, filters, [400, 500, 600]);
        CpuDebayer::new().unwrap().process(&mut image, filters).unwrap();
        assert!(image.pixels.iter().all(|px| *px == [400, 500, 600, 0]));
    }
}
