//! Ownership of the raw and image buffers of a session.

use tracing::debug;

use crate::image_pipeline::common::alloc::{try_filled, try_refill};
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::types::{LayoutClass, RawBuffer};

/// Canonical 4-channel (R, G, B, G2) image, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[u16; 4]>,
}

impl ImageBuffer {
    pub fn get(&self, row: usize, col: usize) -> [u16; 4] {
        self.pixels[row * self.width + col]
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, [u16; 4]> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    /// Largest value per channel.
    pub fn channel_maximum(&self) -> [u32; 4] {
        use rayon::prelude::*;
        self.pixels
            .par_chunks(self.width.max(1))
            .map(|row| {
                let mut max = [0u32; 4];
                for px in row {
                    for c in 0..4 {
                        max[c] = max[c].max(px[c] as u32);
                    }
                }
                max
            })
            .reduce(|| [0; 4], |a, b| std::array::from_fn(|c| a[c].max(b[c])))
    }
}

/// Holds at most one raw buffer and one image buffer.
#[derive(Debug, Default)]
pub struct BufferManager {
    raw: Option<RawBuffer>,
    image: Option<ImageBuffer>,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the raw buffer for `layout`, replacing any previous one.
    pub fn allocate_raw(
        &mut self,
        layout: LayoutClass,
        geometry: &SensorGeometry,
    ) -> Result<&mut RawBuffer, Fault> {
        self.raw = None;
        let buffer = match layout {
            LayoutClass::FlatfieldBayer | LayoutClass::FlatfieldBayer2 => {
                let (width, height) = geometry.raw_extent();
                RawBuffer::Bayer { data: try_filled(width * height, 0u16)?, width, height }
            }
            LayoutClass::FourComponent => {
                let (width, height) = geometry.raw_extent();
                RawBuffer::FourComponent {
                    data: try_filled(width * height, [0u16; 4])?,
                    width,
                    height,
                }
            }
            LayoutClass::Legacy => {
                let (width, height) = (geometry.width, geometry.height);
                RawBuffer::Legacy { data: try_filled(width * height, [0u16; 4])?, width, height }
            }
        };
        debug!(?layout, width = buffer.width(), height = buffer.height(), "Allocated raw buffer");
        Ok(self.raw.insert(buffer))
    }

    /// Zeroed image of `width x height`, reusing the previous allocation.
    pub fn allocate_image(&mut self, width: usize, height: usize) -> Result<&mut ImageBuffer, Fault> {
        let image = self.image.get_or_insert_with(ImageBuffer::default);
        try_refill(&mut image.pixels, width * height, [0u16; 4])?;
        image.width = width;
        image.height = height;
        Ok(image)
    }

    /// Allocates the image and hands out the raw buffer next to it.
    pub fn raw_and_image(
        &mut self,
        width: usize,
        height: usize,
    ) -> Result<(&RawBuffer, &mut ImageBuffer), Fault> {
        if self.raw.is_none() {
            return Err(Fault::DecodeRaw("raw buffer is not loaded".to_string()));
        }
        self.allocate_image(width, height)?;
        match (self.raw.as_ref(), self.image.as_mut()) {
            (Some(raw), Some(image)) => Ok((raw, image)),
            _ => Err(Fault::DecodeRaw("raw buffer is not loaded".to_string())),
        }
    }

    pub fn raw(&self) -> Option<&RawBuffer> {
        self.raw.as_ref()
    }

    pub fn raw_mut(&mut self) -> Option<&mut RawBuffer> {
        self.raw.as_mut()
    }

    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut ImageBuffer> {
        self.image.as_mut()
    }

    pub fn release_raw(&mut self) {
        self.raw = None;
    }

    pub fn release_image(&mut self) {
        self.image = None;
    }

    pub fn release_all(&mut self) {
        self.release_raw();
        self.release_image();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::raw::filters::FilterPattern;

    #[test]
    fn test_raw_sizes_per_layout() {
        let mut geometry = SensorGeometry::bayer(6, 4, FilterPattern::RGGB);
        geometry.left_margin = 2;
        geometry.top_margin = 1;
        let mut buffers = BufferManager::new();

        let raw = buffers.allocate_raw(LayoutClass::FlatfieldBayer2, &geometry).unwrap();
        assert!(matches!(raw, RawBuffer::Bayer { width: 8, height: 5, .. }));
        assert_eq!(raw.len(), 40);

        let raw = buffers.allocate_raw(LayoutClass::FourComponent, &geometry).unwrap();
        assert!(matches!(raw, RawBuffer::FourComponent { width: 8, height: 5, .. }));

        let raw = buffers.allocate_raw(LayoutClass::Legacy, &geometry).unwrap();
        assert!(matches!(raw, RawBuffer::Legacy { width: 6, height: 4, .. }));
        assert_eq!(raw.len(), 24);
    }

    #[test]
    fn test_image_reuse_is_cleared() {
        let mut buffers = BufferManager::new();
        let image = buffers.allocate_image(4, 4).unwrap();
        image.pixels.iter_mut().for_each(|px| *px = [9; 4]);

        let image = buffers.allocate_image(2, 3).unwrap();
        assert_eq!((image.width, image.height), (2, 3));
        assert!(image.pixels.iter().all(|px| *px == [0; 4]));
        assert_eq!(image.pixels.len(), 6);
    }

    #[test]
    fn test_raw_and_image_requires_raw() {
        let mut buffers = BufferManager::new();
        assert!(buffers.raw_and_image(2, 2).is_err());
        buffers.allocate_raw(LayoutClass::FlatfieldBayer, &SensorGeometry::bayer(2, 2, FilterPattern::RGGB)).unwrap();
        let (raw, image) = buffers.raw_and_image(2, 2).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(image.pixels.len(), 4);
    }

    #[test]
    fn test_release() {
        let mut buffers = BufferManager::new();
        buffers.allocate_image(1, 1).unwrap();
        buffers.allocate_raw(LayoutClass::FlatfieldBayer, &SensorGeometry::bayer(2, 2, FilterPattern::RGGB)).unwrap();
        buffers.release_all();
        assert!(buffers.raw().is_none());
        assert!(buffers.image().is_none());
    }

    #[test]
    fn test_channel_maximum() {
        let image = ImageBuffer { width: 2, height: 1, pixels: vec![[1, 5, 0, 2], [3, 4, 7, 0]] };
        assert_eq!(image.channel_maximum(), [3, 5, 7, 2]);
    }
}
