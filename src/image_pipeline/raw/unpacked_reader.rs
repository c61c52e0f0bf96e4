use std::io::SeekFrom;

use tracing::debug;

use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::reader::RawDecoder;
use crate::image_pipeline::raw::registry::DecoderId;
use crate::image_pipeline::raw::stream::DataStream;
use crate::image_pipeline::raw::types::{Identification, RawBuffer};

/// Reads headerless dumps of little-endian 16-bit samples whose geometry is known up
/// front (sensor test captures, firmware dumps).
pub struct UnpackedDecoder {
    template: Identification,
    bits: u32,
}

impl UnpackedDecoder {
    /// `bits` is the sensor bit depth; samples at or above `1 << bits` inside the
    /// visible area are reported as corrupt.
    pub fn new(geometry: SensorGeometry, color: ColorState, bits: u32, data_offset: u64) -> Self {
        let template = Identification {
            make: "Generic".to_string(),
            model: "Unpacked".to_string(),
            geometry,
            color,
            raw_count: 1,
            decoder: Some(DecoderId::Unpacked),
            data_offset,
            zero_is_bad: false,
            is_foveon: false,
        };
        Self { template, bits: bits.clamp(1, 16) }
    }

    fn payload_len(&self) -> u64 {
        let g = &self.template.geometry;
        (g.raw_width * g.raw_height * 2) as u64
    }
}

impl RawDecoder for UnpackedDecoder {
    fn identify(&mut self, stream: &mut dyn DataStream) -> Result<Identification, Fault> {
        let len = stream.seek(SeekFrom::End(0))?;
        if len < self.template.data_offset + self.payload_len() {
            debug!(len, needed = self.template.data_offset + self.payload_len(), "stream too short");
            return Ok(Identification { raw_count: 0, decoder: None, ..self.template.clone() });
        }
        Ok(self.template.clone())
    }

    fn load_raw(
        &mut self,
        stream: &mut dyn DataStream,
        target: &mut RawBuffer,
        geometry: &SensorGeometry,
        _color: &mut ColorState,
    ) -> Result<(), Fault> {
        let stride = target.width();
        let data = target
            .as_bayer_mut()
            .ok_or_else(|| Fault::DecodeRaw("unpacked samples need a single-plane buffer".to_string()))?;

        stream.seek(SeekFrom::Start(self.template.data_offset))?;
        let mut line = vec![0u8; geometry.raw_width * 2];
        for row in 0..geometry.raw_height {
            stream.read_exact(&mut line)?;
            let dst = &mut data[row * stride..row * stride + geometry.raw_width];
            for (col, (px, bytes)) in dst.iter_mut().zip(line.chunks_exact(2)).enumerate() {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]);
                let visible = row.wrapping_sub(geometry.top_margin) < geometry.height
                    && col.wrapping_sub(geometry.left_margin) < geometry.width;
                if visible && (value as u32) >> self.bits != 0 {
                    return Err(Fault::DecodeRaw(format!(
                        "sample {value} at ({row}, {col}) exceeds {} bits",
                        self.bits
                    )));
                }
                *px = value;
            }
        }
        Ok(())
    }
}
