//! Sensor dimensions, margins and derived working sizes.

use crate::image_pipeline::raw::filters::FilterPattern;

/// Parameters of a 45°-rotated (Fuji SuperCCD) sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagonalLayout {
    pub fuji_width: usize,
    /// Selects between the two affine derotation forms.
    pub fuji_layout: bool,
    /// Derotated bounding box.
    pub fwidth: usize,
    pub fheight: usize,
}

impl DiagonalLayout {
    /// Destination coordinates of sensor sample `(row, col)` in the derotated frame.
    pub fn derotate(&self, row: usize, col: usize) -> (isize, isize) {
        let (fw, row, col) = (self.fuji_width as isize, row as isize, col as isize);
        if self.fuji_layout {
            (fw - 1 - col + (row >> 1), col + ((row + 1) >> 1))
        } else {
            (fw - 1 + row - (col >> 1), row + ((col + 1) >> 1))
        }
    }
}

/// Caller supplied crop window in sensor coordinates.
///
/// Components are signed: negative origins are clamped to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl CropBox {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self { left, top, width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorGeometry {
    pub raw_width: usize,
    pub raw_height: usize,
    pub width: usize,
    pub height: usize,
    pub top_margin: usize,
    pub left_margin: usize,
    /// Working image size after the shrink factor is applied.
    pub iwidth: usize,
    pub iheight: usize,
    pub pixel_aspect: f64,
    /// dcraw orientation code: bit 0 mirrors columns, bit 1 rows, bit 2 transposes.
    pub flip: u8,
    pub filters: FilterPattern,
    pub colors: usize,
    pub color_desc: [u8; 4],
    pub diagonal: Option<DiagonalLayout>,
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self {
            raw_width: 0,
            raw_height: 0,
            width: 0,
            height: 0,
            top_margin: 0,
            left_margin: 0,
            iwidth: 0,
            iheight: 0,
            pixel_aspect: 1.0,
            flip: 0,
            filters: FilterPattern::None,
            colors: 3,
            color_desc: *b"RGBG",
            diagonal: None,
        }
    }
}

impl SensorGeometry {
    /// A plain sensor without margins whose raw size equals its visible size.
    pub fn bayer(width: usize, height: usize, filters: FilterPattern) -> Self {
        Self {
            raw_width: width,
            raw_height: height,
            width,
            height,
            iwidth: width,
            iheight: height,
            filters,
            ..Self::default()
        }
    }

    /// Recomputes `iwidth`/`iheight` for the given shrink state.
    pub fn apply_shrink(&mut self, shrink: bool) {
        let s = shrink as usize;
        self.iheight = (self.height + s) >> s;
        self.iwidth = (self.width + s) >> s;
    }

    /// Offset of sensor pixel `(row, col)` in the working image.
    #[inline]
    pub fn pixel_index(&self, row: usize, col: usize, shrink: bool) -> usize {
        let s = shrink as usize;
        (row >> s) * self.iwidth + (col >> s)
    }

    pub fn is_diagonal(&self) -> bool {
        self.diagonal.is_some()
    }

    /// Raw extent needed to hold the visible area plus margins.
    pub fn raw_extent(&self) -> (usize, usize) {
        if self.is_diagonal() {
            (self.raw_width, self.raw_height)
        } else {
            (
                self.raw_width.max(self.width + self.left_margin),
                self.raw_height.max(self.height + self.top_margin),
            )
        }
    }

    /// Whether channel `c` carries a green filter according to the color description.
    pub fn is_green(&self, c: usize) -> bool {
        self.color_desc.get(c) == Some(&b'G')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_index_with_shrink() {
        let mut geom = SensorGeometry::bayer(7, 5, FilterPattern::RGGB);
        geom.apply_shrink(true);
        assert_eq!((geom.iwidth, geom.iheight), (4, 3));
        assert_eq!(geom.pixel_index(3, 5, true), 4 + 2);
        geom.apply_shrink(false);
        assert_eq!(geom.pixel_index(3, 5, false), 3 * 7 + 5);
    }

    #[test]
    fn test_raw_extent_covers_margins() {
        let mut geom = SensorGeometry::bayer(10, 8, FilterPattern::RGGB);
        geom.left_margin = 4;
        geom.top_margin = 2;
        assert_eq!(geom.raw_extent(), (14, 10));
        geom.diagonal = Some(DiagonalLayout::default());
        assert_eq!(geom.raw_extent(), (10, 8));
    }

    #[test]
    fn test_derotation_forms() {
        let layout = DiagonalLayout { fuji_width: 4, fuji_layout: true, fwidth: 0, fheight: 0 };
        assert_eq!(layout.derotate(0, 0), (3, 0));
        assert_eq!(layout.derotate(3, 2), (2, 4));
        let layout = DiagonalLayout { fuji_layout: false, ..layout };
        assert_eq!(layout.derotate(0, 0), (3, 0));
        assert_eq!(layout.derotate(2, 3), (4, 4));
    }
}
