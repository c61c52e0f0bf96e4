//! Bayer mosaic split into its four sub-planes.
//!
//! Plane `i` holds the photosites at `(2 * r + dy, 2 * c + dx)` with
//! `i = (dy << 1) | dx`. On odd sensor dimensions the planes of the second
//! row or column are one cell shorter.

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::common::alloc::try_filled;
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::geometry::SensorGeometry;

/// Where the two greens of a 2x2 mosaic sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreenMode {
    /// Greens at (0,0) and (1,1).
    Leading,
    /// Greens at (0,1) and (1,0).
    Trailing,
}

impl GreenMode {
    /// Pairs of diagonal photosites sharing a color description are treated as greens.
    pub fn detect(geometry: &SensorGeometry) -> Option<Self> {
        let desc = |row, col| geometry.color_desc[geometry.filters.color(row, col)];
        if desc(0, 0) == desc(1, 1) {
            Some(Self::Leading)
        } else if desc(0, 1) == desc(1, 0) {
            Some(Self::Trailing)
        } else {
            None
        }
    }

    pub fn is_green_plane(self, plane: usize) -> bool {
        match self {
            Self::Leading => plane == 0 || plane == 3,
            Self::Trailing => plane == 1 || plane == 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Result<Self, Fault> {
        Ok(Self { width, height, data: try_filled(width * height, 0)? })
    }

    pub fn transposed(&self) -> Result<Self, Fault> {
        let mut out = Self::new(self.height, self.width)?;
        for (row, line) in self.data.chunks_exact(self.width.max(1)).enumerate() {
            for (col, &value) in line.iter().enumerate() {
                out.data[col * self.height + row] = value;
            }
        }
        Ok(out)
    }

    pub fn try_clone(&self) -> Result<Self, Fault> {
        let mut out = Self::new(self.width, self.height)?;
        out.data.copy_from_slice(&self.data);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuadPlanes {
    /// Sensor extent the planes were split from.
    pub width: usize,
    pub height: usize,
    pub planes: [Plane; 4],
}

impl QuadPlanes {
    pub fn new(width: usize, height: usize) -> Result<Self, Fault> {
        let plane = |i: usize| {
            let (dy, dx) = (i >> 1, i & 1);
            Plane::new((width + 1 - dx) / 2, (height + 1 - dy) / 2)
        };
        Ok(Self { width, height, planes: [plane(0)?, plane(1)?, plane(2)?, plane(3)?] })
    }

    /// Sub-plane and offset of sensor position `(row, col)`.
    #[inline]
    fn locate(&self, row: usize, col: usize) -> (usize, usize) {
        let i = ((row & 1) << 1) | (col & 1);
        (i, (row >> 1) * self.planes[i].width + (col >> 1))
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u16 {
        let (i, offset) = self.locate(row, col);
        self.planes[i].data[offset]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u16) {
        let (i, offset) = self.locate(row, col);
        self.planes[i].data[offset] = value;
    }

    /// Collects the visible photosites of a mosaic image.
    pub fn from_image(image: &ImageBuffer, geometry: &SensorGeometry, shrink: bool) -> Result<Self, Fault> {
        let mut planes = Self::new(geometry.width, geometry.height)?;
        for row in 0..geometry.height {
            for col in 0..geometry.width {
                let value = image.pixels[geometry.pixel_index(row, col, shrink)][geometry.filters.color(row, col)];
                planes.set(row, col, value);
            }
        }
        Ok(planes)
    }

    pub fn maximum(&self) -> u16 {
        self.planes.iter().flat_map(|p| p.data.iter().copied()).max().unwrap_or(0)
    }

    /// Applies `f` to every plane independently.
    pub fn map<F>(&self, f: F) -> Result<Self, Fault>
    where
        F: Fn(&Plane) -> Result<Plane, Fault>,
    {
        let [p0, p1, p2, p3] = &self.planes;
        Ok(Self { width: self.width, height: self.height, planes: [f(p0)?, f(p1)?, f(p2)?, f(p3)?] })
    }

    pub fn try_clone(&self) -> Result<Self, Fault> {
        self.map(Plane::try_clone)
    }
}
