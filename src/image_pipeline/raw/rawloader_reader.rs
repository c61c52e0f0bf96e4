//! Decoding strategy backed by the rawloader library.
//!
//! rawloader decodes a whole file in one call, so identification performs the full
//! decode and keeps the result until `load_raw` copies it into the session buffer.
//! Mosaic sensors are reported as single-plane Bayer data; linear (three components
//! per pixel) files are reported as four-component data.

use std::io::{Cursor, SeekFrom};

use rawloader::RawImageData as RawloaderImageData;
use tracing::debug;

use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::filters::FilterPattern;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::reader::RawDecoder;
use crate::image_pipeline::raw::registry::DecoderId;
use crate::image_pipeline::raw::stream::DataStream;
use crate::image_pipeline::raw::types::{Identification, RawBuffer};

#[derive(Default)]
pub struct RawLoaderDecoder {
    decoded: Option<rawloader::RawImage>,
}

impl RawLoaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn samples(image: &rawloader::RawImage) -> Vec<u16> {
        // Float data is normalized to 0.0-1.0.
        match &image.data {
            RawloaderImageData::Integer(values) => values.clone(),
            RawloaderImageData::Float(values) => values
                .iter()
                .map(|&v| (v * u16::MAX as f32).clamp(0.0, u16::MAX as f32) as u16)
                .collect(),
        }
    }

    fn filter_pattern(image: &rawloader::RawImage) -> Option<FilterPattern> {
        let cfa = &image.cfa;
        if cfa.width != 2 || cfa.height != 2 {
            return None;
        }
        let mut tile = [[0u8; 2]; 2];
        for (row, line) in tile.iter_mut().enumerate() {
            for (col, code) in line.iter_mut().enumerate() {
                *code = (cfa.color_at(row, col) & 3) as u8;
            }
        }
        Some(FilterPattern::from_2x2(tile).split_greens())
    }
}

impl RawDecoder for RawLoaderDecoder {
    fn identify(&mut self, stream: &mut dyn DataStream) -> Result<Identification, Fault> {
        stream.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        debug!("Decoding RAW image, {} bytes", bytes.len());

        let decoded = match rawloader::decode(&mut Cursor::new(&bytes)) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "rawloader rejected the stream");
                self.decoded = None;
                return Ok(Identification::default());
            }
        };

        let [top, right, bottom, left] = decoded.crops;
        let raw_width = decoded.width;
        let raw_height = decoded.height;
        let width = raw_width.saturating_sub(left + right);
        let height = raw_height.saturating_sub(top + bottom);

        let (filters, decoder) = match decoded.cpp {
            1 => match Self::filter_pattern(&decoded) {
                Some(pattern) => (pattern, DecoderId::RawLoaderCfa),
                None => {
                    debug!(cfa = %decoded.cfa.name, "unsupported CFA geometry");
                    self.decoded = None;
                    return Ok(Identification::default());
                }
            },
            _ => (FilterPattern::None, DecoderId::RawLoaderLinear),
        };

        let geometry = SensorGeometry {
            raw_width,
            raw_height,
            width,
            height,
            top_margin: top,
            left_margin: left,
            iwidth: width,
            iheight: height,
            filters,
            ..SensorGeometry::default()
        };

        let levels = decoded.blacklevels;
        let green = decoded.wb_coeffs[1];
        let mut multipliers = [1.0f32; 4];
        if green.is_finite() && green > 0.0 {
            for (c, m) in multipliers.iter_mut().enumerate().take(3) {
                *m = decoded.wb_coeffs[c] / green;
            }
            multipliers[3] = multipliers[1];
        }
        let color = ColorState {
            cblack: [levels[0] as u32, levels[1] as u32, levels[2] as u32, levels[1] as u32],
            maximum: decoded.whitelevels.iter().copied().max().unwrap_or(u16::MAX) as u32,
            multipliers,
            ..ColorState::default()
        };

        debug!(
            make = %decoded.clean_make,
            model = %decoded.clean_model,
            raw_width,
            raw_height,
            cpp = decoded.cpp,
            "Identified with rawloader"
        );

        let identification = Identification {
            make: decoded.clean_make.clone(),
            model: decoded.clean_model.clone(),
            geometry,
            color,
            raw_count: 1,
            decoder: Some(decoder),
            data_offset: 0,
            zero_is_bad: false,
            is_foveon: false,
        };
        self.decoded = Some(decoded);
        Ok(identification)
    }

    fn load_raw(
        &mut self,
        _stream: &mut dyn DataStream,
        target: &mut RawBuffer,
        geometry: &SensorGeometry,
        _color: &mut ColorState,
    ) -> Result<(), Fault> {
        let decoded = self
            .decoded
            .as_ref()
            .ok_or_else(|| Fault::DecodeRaw("no decoded image cached".to_string()))?;
        let samples = Self::samples(decoded);
        let (src_width, cpp) = (geometry.raw_width, decoded.cpp.max(1));
        let stride = target.width();

        if samples.len() < src_width * geometry.raw_height * cpp {
            return Err(Fault::DecodeRaw(format!(
                "decoder produced {} samples, expected {}",
                samples.len(),
                src_width * geometry.raw_height * cpp
            )));
        }

        match target {
            RawBuffer::Bayer { data, .. } => {
                for (row, src) in samples.chunks_exact(src_width).take(geometry.raw_height).enumerate() {
                    data[row * stride..row * stride + src_width].copy_from_slice(src);
                }
            }
            RawBuffer::FourComponent { data, .. } => {
                for (row, src) in samples
                    .chunks_exact(src_width * cpp)
                    .take(geometry.raw_height)
                    .enumerate()
                {
                    let dst = &mut data[row * stride..row * stride + src_width];
                    for (cell, px) in dst.iter_mut().zip(src.chunks_exact(cpp)) {
                        for (c, &v) in px.iter().take(4).enumerate() {
                            cell[c] = v;
                        }
                    }
                }
            }
            RawBuffer::Legacy { .. } => {
                return Err(Fault::DecodeRaw("legacy layout is not produced by rawloader".to_string()));
            }
        }
        Ok(())
    }
}
