//! RAW buffer and decoder description types

use rayon::prelude::*;

use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::registry::DecoderId;

/// How a decoder lays out the samples it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutClass {
    /// One sample per photosite, color taken from the filter pattern.
    FlatfieldBayer,
    /// Same storage as `FlatfieldBayer`, colors resolved per pixel.
    FlatfieldBayer2,
    /// Four samples per photosite.
    FourComponent,
    /// Already full color; the buffer is the image.
    Legacy,
}

/// Identifies the strategy that filled a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderDescriptor {
    pub name: &'static str,
    pub layout: LayoutClass,
    /// The layout class was guessed and has not been checked against a reference decode.
    pub provisional: bool,
}

/// Sensor data in the layout chosen by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBuffer {
    Bayer { data: Vec<u16>, width: usize, height: usize },
    FourComponent { data: Vec<[u16; 4]>, width: usize, height: usize },
    Legacy { data: Vec<[u16; 4]>, width: usize, height: usize },
}

impl RawBuffer {
    /// Row stride in cells.
    pub fn width(&self) -> usize {
        match self {
            Self::Bayer { width, .. }
            | Self::FourComponent { width, .. }
            | Self::Legacy { width, .. } => *width,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Bayer { height, .. }
            | Self::FourComponent { height, .. }
            | Self::Legacy { height, .. } => *height,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bayer { data, .. } => data.len(),
            Self::FourComponent { data, .. } | Self::Legacy { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bayer_mut(&mut self) -> Option<&mut [u16]> {
        match self {
            Self::Bayer { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_cells_mut(&mut self) -> Option<&mut [[u16; 4]]> {
        match self {
            Self::FourComponent { data, .. } | Self::Legacy { data, .. } => Some(data),
            Self::Bayer { .. } => None,
        }
    }

    /// Largest sample per channel inside the visible window.
    ///
    /// Legacy buffers hold the visible image only and are scanned whole.
    pub fn channel_maximum(&self, geometry: &SensorGeometry) -> [u32; 4] {
        let (top, left) = (geometry.top_margin, geometry.left_margin);
        let merge = |a: [u32; 4], b: [u32; 4]| std::array::from_fn(|c| a[c].max(b[c]));
        match self {
            Self::Bayer { data, width, height } => {
                let rows = top..(top + geometry.height).min(*height);
                let right = (left + geometry.width).min(*width);
                data.par_chunks((*width).max(1))
                    .enumerate()
                    .filter(|(row, _)| rows.contains(row))
                    .map(|(row, line)| {
                        let mut max = [0u32; 4];
                        for col in left..right {
                            let c = geometry.filters.color(row - top, col - left);
                            max[c] = max[c].max(line[col] as u32);
                        }
                        max
                    })
                    .reduce(|| [0; 4], merge)
            }
            Self::FourComponent { data, width, height } => {
                let rows = top..(top + geometry.height).min(*height);
                let right = (left + geometry.width).min(*width);
                data.par_chunks((*width).max(1))
                    .enumerate()
                    .filter(|(row, _)| rows.contains(row))
                    .map(|(_, line)| {
                        let cells = line.get(left..right).unwrap_or(&[]);
                        cells.iter().fold([0u32; 4], |max, px| merge(max, px.map(u32::from)))
                    })
                    .reduce(|| [0; 4], merge)
            }
            Self::Legacy { data, .. } => data
                .par_iter()
                .fold(|| [0u32; 4], |max, px| merge(max, px.map(u32::from)))
                .reduce(|| [0; 4], merge),
        }
    }
}

/// What a decoder learned about a file while identifying it.
#[derive(Debug, Clone, Default)]
pub struct Identification {
    pub make: String,
    pub model: String,
    pub geometry: SensorGeometry,
    pub color: ColorState,
    /// Number of raw frames in the file.
    pub raw_count: u32,
    pub decoder: Option<DecoderId>,
    /// Stream offset of the first raw sample.
    pub data_offset: u64,
    /// Zero samples mark dead pixels.
    pub zero_is_bad: bool,
    pub is_foveon: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::raw::filters::FilterPattern;

    #[test]
    fn test_bayer_maximum_ignores_margins() {
        let mut geometry = SensorGeometry::bayer(2, 2, FilterPattern::RGGB);
        geometry.left_margin = 1;
        geometry.top_margin = 1;
        #[rustfmt::skip]
        let data = vec![
            9000, 9000, 9000,
            9000,   10,   20,
            9000,   30,   40,
        ];
        let raw = RawBuffer::Bayer { data, width: 3, height: 3 };
        assert_eq!(raw.channel_maximum(&geometry), [10, 20, 40, 30]);
    }

    #[test]
    fn test_cell_maximum() {
        let geometry = SensorGeometry::bayer(2, 1, FilterPattern::None);
        let four = RawBuffer::FourComponent { data: vec![[1, 8, 3, 4], [5, 2, 7, 0]], width: 2, height: 1 };
        assert_eq!(four.channel_maximum(&geometry), [5, 8, 7, 4]);

        let legacy = RawBuffer::Legacy { data: vec![[0, 0, 9, 0], [6, 0, 0, 1]], width: 2, height: 1 };
        assert_eq!(legacy.channel_maximum(&geometry), [6, 0, 9, 1]);
    }
}
