//! Processing options

use std::path::PathBuf;

use crate::image_pipeline::banding::BandingOptions;
use crate::image_pipeline::black_level::DEFAULT_ADJUST_MAXIMUM_THRESHOLD;
use crate::image_pipeline::exposure::ExposureOptions;
use crate::image_pipeline::raw::geometry::CropBox;
use crate::image_pipeline::tiff::TiffOptions;

/// Options of a processing session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOptions {
    /// Decimate the mosaic to half resolution instead of interpolating it.
    pub half_size: bool,
    /// Wavelet denoising threshold; any non-zero value works on a decimated mosaic.
    pub wavelet_threshold: f32,
    /// Chromatic aberration scale for red and blue.
    pub aberration: [f64; 2],
    pub cropbox: Option<CropBox>,
    /// Overrides the black level reported by the decoder.
    pub user_black: Option<u32>,
    /// Overrides the saturation level.
    pub user_sat: Option<u32>,
    /// Orientation override, either a dcraw flip code or 90/180/270 degrees.
    pub user_flip: Option<i32>,
    /// Interpolation quality override.
    pub user_quality: Option<i32>,
    /// Index of the raw frame to decode.
    pub shot_select: u32,
    pub adjust_maximum_threshold: f32,
    /// Rotate diagonal sensors upright and stretch non-square pixels.
    pub use_fuji_rotate: bool,
    /// Interpolate the two greens as separate colors.
    pub four_color_rgb: bool,
    /// Keep raw photosite values, skip white balance and interpolation.
    pub document_mode: bool,
    /// Dead pixel list in dcraw format.
    pub bad_pixels: Option<PathBuf>,
    /// 16-bit PGM dark frame.
    pub dark_frame: Option<PathBuf>,
    /// 0 clips, 1 leaves highlights unclipped, 2 blends, 3 and above rebuild.
    pub highlight: u32,
    pub apply_profile: bool,
    pub banding: Option<BandingOptions>,
    pub exposure: Option<ExposureOptions>,
    /// Output gamma exponent and toe slope.
    pub gamma: [f64; 2],
    pub bright: f32,
    pub no_auto_bright: bool,
    /// 8 or 16.
    pub output_bps: u8,
    pub output_bgr: bool,
    pub tiff: TiffOptions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            half_size: false,
            wavelet_threshold: 0.0,
            aberration: [1.0, 1.0],
            cropbox: None,
            user_black: None,
            user_sat: None,
            user_flip: None,
            user_quality: None,
            shot_select: 0,
            adjust_maximum_threshold: DEFAULT_ADJUST_MAXIMUM_THRESHOLD,
            use_fuji_rotate: true,
            four_color_rgb: false,
            document_mode: false,
            bad_pixels: None,
            dark_frame: None,
            highlight: 0,
            apply_profile: false,
            banding: None,
            exposure: None,
            gamma: [0.45, 4.5],
            bright: 1.0,
            no_auto_bright: false,
            output_bps: 8,
            output_bgr: false,
            tiff: TiffOptions::default(),
        }
    }
}

impl ProcessingOptions {
    pub fn builder() -> ProcessingOptionsBuilder {
        ProcessingOptionsBuilder::default()
    }

    /// Whether a mosaic sensor is decimated while converting raw data.
    pub fn wants_shrink(&self) -> bool {
        self.half_size || self.wavelet_threshold != 0.0 || self.aberration != [1.0, 1.0]
    }
}

/// Builder for ProcessingOptions
#[derive(Default)]
pub struct ProcessingOptionsBuilder {
    half_size: Option<bool>,
    wavelet_threshold: Option<f32>,
    aberration: Option<[f64; 2]>,
    cropbox: Option<Option<CropBox>>,
    user_black: Option<Option<u32>>,
    user_sat: Option<Option<u32>>,
    user_flip: Option<Option<i32>>,
    user_quality: Option<Option<i32>>,
    shot_select: Option<u32>,
    adjust_maximum_threshold: Option<f32>,
    use_fuji_rotate: Option<bool>,
    four_color_rgb: Option<bool>,
    document_mode: Option<bool>,
    bad_pixels: Option<Option<PathBuf>>,
    dark_frame: Option<Option<PathBuf>>,
    highlight: Option<u32>,
    apply_profile: Option<bool>,
    banding: Option<Option<BandingOptions>>,
    exposure: Option<Option<ExposureOptions>>,
    gamma: Option<[f64; 2]>,
    bright: Option<f32>,
    no_auto_bright: Option<bool>,
    output_bps: Option<u8>,
    output_bgr: Option<bool>,
    tiff: Option<TiffOptions>,
}

impl ProcessingOptionsBuilder {
    pub fn half_size(mut self, enable: bool) -> Self {
        self.half_size = Some(enable);
        self
    }

    pub fn wavelet_threshold(mut self, threshold: f32) -> Self {
        self.wavelet_threshold = Some(threshold);
        self
    }

    pub fn aberration(mut self, red: f64, blue: f64) -> Self {
        self.aberration = Some([red, blue]);
        self
    }

    pub fn cropbox(mut self, cropbox: Option<CropBox>) -> Self {
        self.cropbox = Some(cropbox);
        self
    }

    pub fn user_black(mut self, black: Option<u32>) -> Self {
        self.user_black = Some(black);
        self
    }

    pub fn user_sat(mut self, saturation: Option<u32>) -> Self {
        self.user_sat = Some(saturation);
        self
    }

    pub fn user_flip(mut self, flip: Option<i32>) -> Self {
        self.user_flip = Some(flip);
        self
    }

    pub fn user_quality(mut self, quality: Option<i32>) -> Self {
        self.user_quality = Some(quality);
        self
    }

    pub fn shot_select(mut self, shot: u32) -> Self {
        self.shot_select = Some(shot);
        self
    }

    pub fn adjust_maximum_threshold(mut self, threshold: f32) -> Self {
        self.adjust_maximum_threshold = Some(threshold);
        self
    }

    pub fn use_fuji_rotate(mut self, enable: bool) -> Self {
        self.use_fuji_rotate = Some(enable);
        self
    }

    pub fn four_color_rgb(mut self, enable: bool) -> Self {
        self.four_color_rgb = Some(enable);
        self
    }

    pub fn document_mode(mut self, enable: bool) -> Self {
        self.document_mode = Some(enable);
        self
    }

    pub fn bad_pixels(mut self, path: Option<PathBuf>) -> Self {
        self.bad_pixels = Some(path);
        self
    }

    pub fn dark_frame(mut self, path: Option<PathBuf>) -> Self {
        self.dark_frame = Some(path);
        self
    }

    pub fn highlight(mut self, mode: u32) -> Self {
        self.highlight = Some(mode);
        self
    }

    pub fn apply_profile(mut self, enable: bool) -> Self {
        self.apply_profile = Some(enable);
        self
    }

    pub fn banding(mut self, banding: Option<BandingOptions>) -> Self {
        self.banding = Some(banding);
        self
    }

    pub fn exposure(mut self, exposure: Option<ExposureOptions>) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn gamma(mut self, power: f64, toe_slope: f64) -> Self {
        self.gamma = Some([power, toe_slope]);
        self
    }

    pub fn bright(mut self, bright: f32) -> Self {
        self.bright = Some(bright);
        self
    }

    pub fn no_auto_bright(mut self, disable: bool) -> Self {
        self.no_auto_bright = Some(disable);
        self
    }

    pub fn output_bps(mut self, bps: u8) -> Self {
        self.output_bps = Some(bps);
        self
    }

    pub fn output_bgr(mut self, bgr: bool) -> Self {
        self.output_bgr = Some(bgr);
        self
    }

    pub fn tiff(mut self, tiff: TiffOptions) -> Self {
        self.tiff = Some(tiff);
        self
    }

    pub fn build(self) -> ProcessingOptions {
        let default = ProcessingOptions::default();
        ProcessingOptions {
            half_size: self.half_size.unwrap_or(default.half_size),
            wavelet_threshold: self.wavelet_threshold.unwrap_or(default.wavelet_threshold),
            aberration: self.aberration.unwrap_or(default.aberration),
            cropbox: self.cropbox.unwrap_or(default.cropbox),
            user_black: self.user_black.unwrap_or(default.user_black),
            user_sat: self.user_sat.unwrap_or(default.user_sat),
            user_flip: self.user_flip.unwrap_or(default.user_flip),
            user_quality: self.user_quality.unwrap_or(default.user_quality),
            shot_select: self.shot_select.unwrap_or(default.shot_select),
            adjust_maximum_threshold: self
                .adjust_maximum_threshold
                .unwrap_or(default.adjust_maximum_threshold),
            use_fuji_rotate: self.use_fuji_rotate.unwrap_or(default.use_fuji_rotate),
            four_color_rgb: self.four_color_rgb.unwrap_or(default.four_color_rgb),
            document_mode: self.document_mode.unwrap_or(default.document_mode),
            bad_pixels: self.bad_pixels.unwrap_or(default.bad_pixels),
            dark_frame: self.dark_frame.unwrap_or(default.dark_frame),
            highlight: self.highlight.unwrap_or(default.highlight),
            apply_profile: self.apply_profile.unwrap_or(default.apply_profile),
            banding: self.banding.unwrap_or(default.banding),
            exposure: self.exposure.unwrap_or(default.exposure),
            gamma: self.gamma.unwrap_or(default.gamma),
            bright: self.bright.unwrap_or(default.bright),
            no_auto_bright: self.no_auto_bright.unwrap_or(default.no_auto_bright),
            output_bps: self.output_bps.unwrap_or(default.output_bps),
            output_bgr: self.output_bgr.unwrap_or(default.output_bgr),
            tiff: self.tiff.unwrap_or(default.tiff),
        }
    }
}
