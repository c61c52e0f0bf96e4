//! Color filter array description.
//!
//! Channel indices follow the canonical image layout: 0 = red, 1 = green,
//! 2 = blue, 3 = second green (or a fourth filter color).

/// Fixed 16x16 mosaic used by Leaf CatchLight backs.
const LEAF_TABLE: [[u8; 16]; 16] = [
    [2, 1, 1, 3, 2, 3, 2, 0, 3, 2, 3, 0, 1, 2, 1, 0],
    [0, 3, 0, 2, 0, 1, 3, 1, 0, 1, 1, 2, 0, 3, 3, 2],
    [2, 3, 3, 2, 3, 1, 1, 3, 3, 1, 2, 1, 2, 0, 0, 3],
    [0, 1, 0, 1, 0, 2, 0, 2, 2, 0, 3, 0, 1, 3, 2, 1],
    [3, 1, 1, 2, 0, 1, 0, 2, 1, 3, 1, 3, 0, 1, 3, 0],
    [2, 0, 0, 3, 3, 2, 3, 1, 2, 0, 2, 0, 3, 2, 2, 1],
    [2, 3, 3, 1, 2, 1, 2, 1, 2, 1, 1, 2, 3, 0, 0, 1],
    [1, 0, 0, 2, 3, 0, 0, 3, 0, 3, 0, 3, 2, 1, 2, 3],
    [2, 3, 3, 1, 1, 2, 1, 0, 3, 2, 3, 0, 2, 3, 1, 3],
    [1, 0, 2, 0, 3, 0, 3, 2, 0, 1, 1, 2, 0, 1, 0, 2],
    [0, 1, 1, 3, 3, 2, 2, 1, 1, 3, 3, 0, 2, 1, 3, 2],
    [2, 3, 2, 0, 0, 1, 3, 0, 2, 0, 1, 2, 3, 0, 1, 0],
    [1, 3, 1, 2, 3, 2, 3, 2, 0, 2, 0, 1, 1, 0, 3, 0],
    [0, 2, 0, 3, 1, 0, 0, 1, 1, 3, 3, 2, 3, 2, 2, 1],
    [2, 1, 3, 2, 3, 1, 2, 1, 0, 3, 0, 2, 0, 2, 0, 2],
    [0, 3, 1, 0, 0, 2, 0, 3, 2, 1, 3, 1, 1, 3, 1, 3],
];

/// Positional color-index function of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPattern {
    /// Full-color or linear data, no mosaic.
    #[default]
    None,
    /// Packed 2-bit codes for an 8-row by 2-column tile.
    Bayer(u32),
    /// The Leaf 16x16 table, addressed with the given phase.
    Leaf16 { row_offset: usize, col_offset: usize },
}

impl FilterPattern {
    // The green sharing rows with blue is G2.
    /// R G / G2 B
    pub const RGGB: Self = Self::Bayer(0xB4B4_B4B4);
    /// B G2 / G R
    pub const BGGR: Self = Self::Bayer(0x1E1E_1E1E);
    /// G R / B G2
    pub const GRBG: Self = Self::Bayer(0xE1E1_E1E1);
    /// G2 B / R G
    pub const GBRG: Self = Self::Bayer(0x4B4B_4B4B);

    /// Builds the packed form from a 2x2 tile given as `[[c00, c01], [c10, c11]]`.
    pub fn from_2x2(tile: [[u8; 2]; 2]) -> Self {
        let mut bits = 0u32;
        for row in 0..8usize {
            for col in 0..2usize {
                let code = (tile[row & 1][col] & 3) as u32;
                bits |= code << (((row << 1) + col) << 1);
            }
        }
        Self::Bayer(bits)
    }

    pub fn is_mosaic(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Channel of the photosite at `(row, col)`.
    pub fn color(&self, row: usize, col: usize) -> usize {
        match *self {
            Self::None => 0,
            Self::Bayer(bits) => ((bits >> ((((row << 1) & 14) + (col & 1)) << 1)) & 3) as usize,
            Self::Leaf16 { row_offset, col_offset } => {
                LEAF_TABLE[(row + row_offset) & 15][(col + col_offset) & 15] as usize
            }
        }
    }

    /// Smallest column count after which every row repeats.
    pub fn column_period(&self) -> usize {
        match self {
            Self::None => 1,
            Self::Bayer(_) => 2,
            Self::Leaf16 { .. } => 16,
        }
    }

    /// The pattern as seen from a window whose origin is `(top, left)` in this pattern.
    pub fn shifted(&self, top: usize, left: usize) -> Self {
        match *self {
            Self::None => Self::None,
            Self::Bayer(_) => {
                let mut bits = 0u32;
                for c in 0..16usize {
                    let code = self.color((c >> 1) + top, (c & 1) + left) as u32;
                    bits |= code << (c * 2);
                }
                Self::Bayer(bits)
            }
            Self::Leaf16 { row_offset, col_offset } => Self::Leaf16 {
                row_offset: (row_offset + top) & 15,
                col_offset: (col_offset + left) & 15,
            },
        }
    }

    /// True when the mosaic repeats with a 2x2 period over a 10x10 window.
    pub fn is_bayer_2x2(&self) -> bool {
        if !matches!(self, Self::Bayer(_)) {
            return false;
        }
        for row in 0..2 {
            for col in 0..2 {
                let base = self.color(row, col);
                for rs in (0..=8).step_by(2) {
                    for cs in (0..=8).step_by(2) {
                        if self.color(row + rs, col + cs) != base {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Marks the green sharing rows with blue as channel 3, so that both greens of a
    /// three-color mosaic can be told apart.
    pub fn split_greens(&self) -> Self {
        match *self {
            Self::Bayer(bits) => Self::Bayer(
                bits | (((bits >> 2) & 0x2222_2222) | ((bits << 2) & 0x8888_8888)) & (bits << 1),
            ),
            other => other,
        }
    }

    /// Folds the second green back onto channel 1.
    pub fn merge_greens(&self) -> Self {
        match *self {
            Self::Bayer(bits) => Self::Bayer(bits & !((bits & 0x5555_5555) << 1)),
            other => other,
        }
    }
}
