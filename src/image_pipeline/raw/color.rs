//! Black levels, saturation and per-channel maxima.

/// Split-image black reference used by Phase One backs: one pair of values per
/// sensor row, left and right of `split_col`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitBlackReference {
    pub t_black: i32,
    pub split_col: usize,
    pub rows: Vec<[i32; 2]>,
}

impl SplitBlackReference {
    /// Reference value for the raw sample at absolute sensor coordinates.
    pub fn at(&self, raw_row: usize, raw_col: usize) -> i32 {
        self.rows
            .get(raw_row)
            .map(|pair| pair[(raw_col >= self.split_col) as usize])
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    pub black: u32,
    pub cblack: [u32; 4],
    /// Saturation ceiling.
    pub maximum: u32,
    pub channel_maximum: [u32; 4],
    pub multipliers: [f32; 4],
    pub split_black: Option<SplitBlackReference>,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            black: 0,
            cblack: [0; 4],
            maximum: 0,
            channel_maximum: [0; 4],
            multipliers: [1.0; 4],
            split_black: None,
        }
    }
}

impl ColorState {
    /// Per-channel value to subtract: `cblack[c] + black`.
    pub fn combined_black(&self) -> [u32; 4] {
        let mut cblk = self.cblack;
        for value in &mut cblk {
            *value = value.saturating_add(self.black);
        }
        cblk
    }

    pub fn has_black(&self) -> bool {
        self.black != 0 || self.cblack.iter().any(|&c| c != 0)
    }

    /// Moves the common part of the per-channel offsets into the scalar black.
    pub fn normalize_black(&mut self) {
        let common = self.cblack.iter().copied().min().unwrap_or(0);
        for c in &mut self.cblack {
            *c -= common;
        }
        self.black += common;
    }

    pub fn real_maximum(&self) -> u32 {
        self.channel_maximum.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_black_moves_common_offset() {
        let mut color = ColorState { black: 10, cblack: [4, 6, 5, 4], ..Default::default() };
        color.normalize_black();
        assert_eq!(color.black, 14);
        assert_eq!(color.cblack, [0, 2, 1, 0]);
        assert_eq!(color.combined_black(), [14, 16, 15, 14]);
    }

    #[test]
    fn test_combined_black_saturates() {
        let color = ColorState { black: u32::MAX - 1, cblack: [0, 4, 0, 0], ..Default::default() };
        assert_eq!(color.combined_black(), [u32::MAX - 1, u32::MAX, u32::MAX - 1, u32::MAX - 1]);
    }

    #[test]
    fn test_split_reference_lookup() {
        let reference = SplitBlackReference { t_black: 0, split_col: 3, rows: vec![[1, 2], [3, 4]] };
        assert_eq!(reference.at(1, 2), 3);
        assert_eq!(reference.at(1, 3), 4);
        assert_eq!(reference.at(5, 0), 0);
    }
}
