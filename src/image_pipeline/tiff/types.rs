//! TIFF output configuration types

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Encoder settings for rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffOptions {
    pub compression: TiffCompression,
    /// Predictor tag value, 2 selects horizontal differencing.
    pub predictor: Option<u16>,
}

impl Default for TiffOptions {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
        }
    }
}

impl TiffOptions {
    pub fn builder() -> TiffOptionsBuilder {
        TiffOptionsBuilder::default()
    }
}

#[derive(Default)]
pub struct TiffOptionsBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
}

impl TiffOptionsBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn build(self) -> TiffOptions {
        let default = TiffOptions::default();
        TiffOptions {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
        }
    }
}
