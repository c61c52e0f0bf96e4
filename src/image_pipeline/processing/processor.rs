use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info, info_span, instrument, warn};

use crate::image_pipeline::banding::{BandingFilter, BandingStatus};
use crate::image_pipeline::black_level::{self, BlackSubtraction};
use crate::image_pipeline::buffers::{BufferManager, ImageBuffer};
use crate::image_pipeline::common::error::{Fault, ProcessingError, Result};
use crate::image_pipeline::convert::RawToImageConverter;
use crate::image_pipeline::exposure::apply_exposure;
use crate::image_pipeline::options::ProcessingOptions;
use crate::image_pipeline::output::{self, MemImageFormat, ProcessedImage, RenderSettings};
use crate::image_pipeline::processing::timing::{StageTimings, Timer};
use crate::image_pipeline::progress::{
    ProgressAction, ProgressCallback, ProgressFlags, ProgressStage, ProgressStateMachine,
};
use crate::image_pipeline::raw::{
    BufferStream, ColorState, CropBox, DataStream, DecoderDescriptor, FileStream, Identification,
    RawBuffer, RawDecoder, RawLoaderDecoder, SensorGeometry, describe,
};
use crate::image_pipeline::strategies::{
    PipelineState, ProcessingStrategies, StageContext, StandardStrategies,
};
use crate::image_pipeline::tiff::{StandardTiffWriter, TiffWriter};

/// Sizes and color data as they were right after decoding. Every conversion
/// starts over from here.
#[derive(Debug, Clone)]
struct RawSnapshot {
    geometry: SensorGeometry,
    color: ColorState,
}

/// Maps a strategy failure onto the public error set.
fn strategy_error(err: anyhow::Error) -> ProcessingError {
    match err.downcast::<Fault>() {
        Ok(fault) => fault.into(),
        Err(other) => ProcessingError::Unspecified(format!("{other:#}")),
    }
}

/// Normalizes a user orientation given in degrees to a flip code.
fn flip_code(user_flip: i32) -> u8 {
    match (user_flip + 3600).rem_euclid(360) {
        270 => 5,
        180 => 3,
        90 => 6,
        _ => (user_flip & 7) as u8,
    }
}

/// One RAW processing session.
///
/// Operations must be called in stage order: open, [`unpack`](Self::unpack),
/// then one of the `process_*` entry points or the individual steps, then
/// output. Calls out of order fail with `OutOfOrderCall` and leave the session
/// untouched; any other failure recycles the session.
pub struct RawProcessor<D: RawDecoder, S: ProcessingStrategies, W: TiffWriter> {
    decoder: D,
    strategies: S,
    writer: W,
    options: ProcessingOptions,
    buffers: BufferManager,
    progress: ProgressStateMachine,
    callback: Option<ProgressCallback>,
    stream: Option<Box<dyn DataStream>>,
    identification: Option<Identification>,
    descriptor: Option<DecoderDescriptor>,
    geometry: SensorGeometry,
    color: ColorState,
    snapshot: Option<RawSnapshot>,
    state: PipelineState,
    timings: StageTimings,
}

impl RawProcessor<RawLoaderDecoder, StandardStrategies, StandardTiffWriter> {
    pub fn new(options: ProcessingOptions) -> Self {
        Self::with_custom(RawLoaderDecoder::new(), StandardStrategies, StandardTiffWriter, options)
    }
}

impl<D: RawDecoder, S: ProcessingStrategies, W: TiffWriter> RawProcessor<D, S, W> {
    pub fn with_custom(decoder: D, strategies: S, writer: W, options: ProcessingOptions) -> Self {
        Self {
            decoder,
            strategies,
            writer,
            options,
            buffers: BufferManager::new(),
            progress: ProgressStateMachine::new(),
            callback: None,
            stream: None,
            identification: None,
            descriptor: None,
            geometry: SensorGeometry::default(),
            color: ColorState::default(),
            snapshot: None,
            state: PipelineState::default(),
            timings: StageTimings::new(),
        }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ProcessingOptions) {
        self.options = options;
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.callback = Some(callback);
    }

    pub fn clear_progress_callback(&mut self) {
        self.callback = None;
    }

    pub fn progress_flags(&self) -> ProgressFlags {
        self.progress.flags()
    }

    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    pub fn color(&self) -> &ColorState {
        &self.color
    }

    pub fn identification(&self) -> Option<&Identification> {
        self.identification.as_ref()
    }

    pub fn raw(&self) -> Option<&RawBuffer> {
        self.buffers.raw()
    }

    pub fn image(&self) -> Option<&ImageBuffer> {
        self.buffers.image()
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Releases every buffer and forgets the current file. Options and the
    /// progress callback are kept.
    pub fn recycle(&mut self) {
        self.buffers.release_all();
        self.progress.reset();
        self.stream = None;
        self.identification = None;
        self.descriptor = None;
        self.geometry = SensorGeometry::default();
        self.color = ColorState::default();
        self.snapshot = None;
        self.state = PipelineState::default();
        self.timings.clear();
    }

    /// Runs `body` and recycles the session if it fails.
    fn guarded<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        match body(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, code = err.code().as_i32(), "Processing failed, session recycled");
                self.recycle();
                Err(err)
            }
        }
    }

    fn notify(&mut self, stage: ProgressStage, current: u32, total: u32) -> Result<()> {
        if let Some(callback) = self.callback.as_mut() {
            if callback(stage, current, total) == ProgressAction::Cancel {
                info!(stage = %stage, "Cancelled by progress callback");
                return Err(Fault::CancelledByCallback.into());
            }
        }
        Ok(())
    }

    fn identification_ref(&self) -> Result<&Identification> {
        self.identification
            .as_ref()
            .ok_or_else(|| ProcessingError::OutOfOrderCall("no file is open".to_string()))
    }

    fn require_image(&self) -> Result<()> {
        if self.buffers.image().is_none() {
            return Err(ProcessingError::OutOfOrderCall("raw data has not been converted".to_string()));
        }
        Ok(())
    }

    /// Runs one strategy step, reporting progress around it and marking it done.
    fn run_stage(
        &mut self,
        stage: ProgressStage,
        step: impl FnOnce(&S, &mut StageContext) -> anyhow::Result<()>,
    ) -> Result<()> {
        self.notify(stage, 0, 2)?;
        let timer = Timer::start(stage.description());
        {
            let _span = info_span!("stage", name = %stage).entered();
            let image = self
                .buffers
                .image_mut()
                .ok_or_else(|| ProcessingError::Unspecified("image buffer is missing".to_string()))?;
            let mut ctx = StageContext {
                image,
                geometry: &mut self.geometry,
                color: &mut self.color,
                options: &self.options,
                state: &mut self.state,
            };
            step(&self.strategies, &mut ctx).map_err(strategy_error)?;
        }
        self.timings.record(timer);
        self.progress.advance(stage)?;
        self.notify(stage, 1, 2)
    }

    /// Marks a stage whose work does not apply to this image.
    fn skip_stage(&mut self, stage: ProgressStage) -> Result<()> {
        debug!(stage = %stage, "Stage skipped");
        self.progress.advance(stage)
    }

    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(input = %path.display(), "Opening file");
        match FileStream::open(path) {
            Ok(stream) => self.open_datastream(Box::new(stream)),
            Err(e) => {
                self.recycle();
                Err(ProcessingError::IoError(format!("{}: {}", path.display(), e)))
            }
        }
    }

    pub fn open_buffer(&mut self, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            self.recycle();
            return Err(ProcessingError::IoError("empty input buffer".to_string()));
        }
        self.open_datastream(Box::new(BufferStream::new(data)))
    }

    /// Identifies the file behind `stream` and prepares the working sizes.
    #[instrument(skip_all)]
    pub fn open_datastream(&mut self, mut stream: Box<dyn DataStream>) -> Result<()> {
        self.recycle();
        self.guarded(|p| {
            let timer = Timer::start("identify");
            p.progress.advance(ProgressStage::Open)?;
            let mut id = {
                let _span = info_span!("identify").entered();
                p.decoder.identify(stream.as_mut())?
            };

            let g = &mut id.geometry;
            if let Some(mut layout) = g.diagonal {
                layout.fwidth = g.width;
                layout.fheight = g.height;
                g.width = layout.fuji_width << (!layout.fuji_layout as usize);
                g.height = g.raw_height;
                g.raw_height += 2 * g.top_margin;
                g.diagonal = Some(layout);
            }
            p.progress.advance(ProgressStage::Identify)?;
            if id.raw_count < 1 {
                return Err(ProcessingError::FileUnsupported);
            }

            p.state.shrink = id.geometry.filters.is_mosaic() && p.options.wants_shrink();
            id.geometry.apply_shrink(p.state.shrink);
            p.geometry = id.geometry.clone();
            p.color = id.color.clone();
            p.snapshot = Some(RawSnapshot { geometry: id.geometry.clone(), color: id.color.clone() });
            info!(
                make = %id.make,
                model = %id.model,
                width = id.geometry.width,
                height = id.geometry.height,
                raw_count = id.raw_count,
                "Identified RAW file"
            );
            p.identification = Some(id);
            p.stream = Some(stream);
            p.timings.record(timer);
            p.progress.advance(ProgressStage::SizeAdjust)
        })
    }

    /// Decodes the selected frame into the raw buffer.
    #[instrument(skip(self))]
    pub fn unpack(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::Identify)?;
        self.progress.require_at_most(ProgressStage::SizeAdjust)?;
        let id = self.identification_ref()?;
        if self.options.shot_select >= id.raw_count {
            return Err(ProcessingError::NoSuchImage {
                requested: self.options.shot_select,
                available: id.raw_count,
            });
        }
        let descriptor = describe(id.decoder, id.geometry.filters.is_mosaic())?;
        if descriptor.provisional {
            warn!(decoder = descriptor.name, "Sample layout of this decoder is unverified");
        }

        self.guarded(|p| {
            p.notify(ProgressStage::LoadRaw, 0, 2)?;
            let timer = Timer::start(ProgressStage::LoadRaw.description());
            let data_offset = p.identification_ref()?.data_offset;
            let stream = p
                .stream
                .as_mut()
                .ok_or_else(|| ProcessingError::IoError("input stream is closed".to_string()))?;
            let raw = p.buffers.allocate_raw(descriptor.layout, &p.geometry)?;
            {
                let _span = info_span!("load_raw", decoder = descriptor.name).entered();
                stream.seek(SeekFrom::Start(data_offset)).map_err(Fault::from)?;
                p.decoder.load_raw(stream.as_mut(), raw, &p.geometry, &mut p.color)?;
            }

            p.color.channel_maximum = raw.channel_maximum(&p.geometry);
            p.color.normalize_black();
            debug!(
                black = p.color.black,
                cblack = ?p.color.cblack,
                channel_maximum = ?p.color.channel_maximum,
                "Raw data loaded"
            );
            p.snapshot = Some(RawSnapshot { geometry: p.geometry.clone(), color: p.color.clone() });
            p.descriptor = Some(descriptor);
            p.timings.record(timer);
            p.progress.advance(ProgressStage::LoadRaw)?;
            p.notify(ProgressStage::LoadRaw, 1, 2)
        })
    }

    /// Restores the decode-time state and applies user overrides.
    fn raw2image_start(&mut self) -> Result<()> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| ProcessingError::OutOfOrderCall("no file is open".to_string()))?;
        self.geometry = snapshot.geometry.clone();
        self.color = snapshot.color.clone();

        if let Some(flip) = self.options.user_flip.filter(|f| *f >= 0) {
            self.geometry.flip = flip_code(flip);
        }
        self.state.shrink = self.geometry.filters.is_mosaic() && self.options.wants_shrink();
        self.geometry.apply_shrink(self.state.shrink);
        if let Some(black) = self.options.user_black {
            self.color.black = black;
        }
        Ok(())
    }

    fn convert(&mut self, crop: Option<CropBox>, derotate: bool) -> Result<()> {
        self.raw2image_start()?;
        let descriptor = self
            .descriptor
            .ok_or_else(|| ProcessingError::OutOfOrderCall("raw data has not been unpacked".to_string()))?;
        let converter = RawToImageConverter::new(self.state.shrink)
            .with_crop(crop)
            .with_derotation(derotate);
        let timer = Timer::start("raw2image");
        converter.convert(&mut self.buffers, &mut self.geometry, &mut self.color, &descriptor)?;
        self.timings.record(timer);
        self.progress.rewind_to(ProgressStage::LoadRaw);
        Ok(())
    }

    /// Builds the image from the raw buffer, without crop or derotation.
    pub fn raw2image(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::LoadRaw)?;
        self.guarded(|p| p.convert(None, false))
    }

    /// Builds the image honoring the crop box and derotating diagonal sensors.
    pub fn raw2image_ex(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::LoadRaw)?;
        self.guarded(|p| p.raw2image_ex_inner())
    }

    fn raw2image_ex_inner(&mut self) -> Result<()> {
        self.convert(self.options.cropbox, true)
    }

    /// Drops the image and returns to the just-unpacked state.
    pub fn free_image(&mut self) {
        if self.buffers.image().is_some() {
            self.buffers.release_image();
            self.progress.rewind_to(ProgressStage::LoadRaw);
        }
    }

    pub fn subtract_black(&mut self) -> Result<BlackSubtraction> {
        self.progress.require(ProgressStage::LoadRaw)?;
        self.require_image()?;
        self.guarded(|p| p.subtract_black_inner())
    }

    fn subtract_black_inner(&mut self) -> Result<BlackSubtraction> {
        let image = self
            .buffers
            .image_mut()
            .ok_or_else(|| ProcessingError::Unspecified("image buffer is missing".to_string()))?;
        Ok(black_level::subtract_black(image, &self.geometry, &mut self.color, self.state.shrink)?)
    }

    /// Applies the saturation heuristics and overrides. Returns whether the
    /// maximum changed.
    pub fn adjust_maximum(&mut self) -> Result<bool> {
        self.progress.require(ProgressStage::LoadRaw)?;
        Ok(self.adjust_maximum_inner())
    }

    fn adjust_maximum_inner(&mut self) -> bool {
        let mut changed = black_level::adjust_maximum(&mut self.color, self.options.adjust_maximum_threshold);
        if let Some(saturation) = self.options.user_sat.filter(|s| *s > 0) {
            changed |= self.color.maximum != saturation;
            self.color.maximum = saturation;
        }
        changed
    }

    /// Removes row and column banding from the mosaic.
    pub fn remove_banding(&mut self) -> Result<BandingStatus> {
        self.progress.require(ProgressStage::LoadRaw)?;
        self.progress.require_at_most(ProgressStage::ScaleColors)?;
        self.require_image()?;
        self.guarded(|p| p.remove_banding_inner())
    }

    fn remove_banding_inner(&mut self) -> Result<BandingStatus> {
        let options = self.options.banding.unwrap_or_default();
        let image = self
            .buffers
            .image_mut()
            .ok_or_else(|| ProcessingError::Unspecified("image buffer is missing".to_string()))?;
        let timer = Timer::start("banding");
        let status = BandingFilter::new(options).apply(image, &self.geometry, self.state.shrink)?;
        self.timings.record(timer);
        if status != BandingStatus::Corrected {
            info!(?status, "Banding removal skipped");
        }
        Ok(status)
    }

    pub fn exposure_correction(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::LoadRaw)?;
        self.require_image()?;
        self.guarded(|p| p.exposure_inner())
    }

    fn exposure_inner(&mut self) -> Result<()> {
        let options = self.options.exposure.unwrap_or_default();
        let image = self
            .buffers
            .image_mut()
            .ok_or_else(|| ProcessingError::Unspecified("image buffer is missing".to_string()))?;
        let timer = Timer::start("exposure");
        apply_exposure(image, &mut self.color, &options)?;
        self.timings.record(timer);
        Ok(())
    }

    /// Stages before pre-interpolation that both entry points share.
    fn raw_cleanup(&mut self) -> Result<bool> {
        self.raw2image_ex_inner()?;
        let id = self.identification_ref()?;
        let (zero_is_bad, is_foveon) = (id.zero_is_bad, id.is_foveon);
        let uncropped = self.options.cropbox.is_none();

        if zero_is_bad {
            self.run_stage(ProgressStage::RemoveZeroes, |s, ctx| s.remove_zeroes(ctx))?;
        }
        if self.options.bad_pixels.is_some() && uncropped {
            self.run_stage(ProgressStage::BadPixels, |s, ctx| s.bad_pixels(ctx))?;
        }
        if self.options.dark_frame.is_some() && uncropped {
            self.run_stage(ProgressStage::DarkFrame, |s, ctx| s.dark_frame(ctx))?;
        }
        Ok(is_foveon)
    }

    /// Keeps raw photosite values: no white balance and no interpolation.
    #[instrument(skip(self))]
    pub fn process_document_mode(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::LoadRaw)?;
        info!("Starting document mode processing");
        self.guarded(|p| {
            p.timings.clear();
            p.state = PipelineState {
                document_mode: true,
                four_color_rgb: p.options.four_color_rgb,
                ..PipelineState::default()
            };
            let is_foveon = p.raw_cleanup()?;

            if p.geometry.is_diagonal() {
                p.subtract_black_inner()?;
            }
            p.adjust_maximum_inner();

            p.run_stage(ProgressStage::PreInterpolate, |s, ctx| s.pre_interpolate(ctx))?;
            p.run_stage(ProgressStage::MixGreen, |s, ctx| s.mix_green(ctx))?;
            if !is_foveon && p.geometry.colors == 3 {
                p.run_stage(ProgressStage::MedianFilter, |s, ctx| s.median_filter(ctx))?;
            }
            if p.options.highlight >= 2 {
                p.run_stage(ProgressStage::Highlights, |s, ctx| s.highlights(ctx))?;
            }
            // Document output keeps the sensor lattice
            p.skip_stage(ProgressStage::FujiRotate)?;
            if p.options.apply_profile {
                p.run_stage(ProgressStage::ApplyProfile, |s, ctx| s.apply_profile(ctx))?;
            }
            p.run_stage(ProgressStage::ConvertRgb, |s, ctx| s.convert_to_rgb(ctx))?;
            p.skip_stage(ProgressStage::Stretch)?;

            p.timings.log_summary();
            info!(width = p.geometry.iwidth, height = p.geometry.iheight, "Document mode processing complete");
            Ok(())
        })
    }

    /// Full development: black, white balance, demosaic, rotation and stretch.
    #[instrument(skip(self))]
    pub fn process_full(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::LoadRaw)?;
        info!("Starting full processing");
        self.guarded(|p| {
            p.timings.clear();
            p.state = PipelineState {
                document_mode: p.options.document_mode,
                four_color_rgb: p.options.four_color_rgb || p.options.half_size,
                ..PipelineState::default()
            };
            let is_foveon = p.raw_cleanup()?;

            let diagonal = p.geometry.diagonal.is_some_and(|d| d.fuji_width != 0);
            p.state.quality = p.options.user_quality.unwrap_or(2 + !diagonal as i32);

            if p.options.banding.is_some() {
                p.remove_banding_inner()?;
            }
            p.subtract_black_inner()?;
            p.adjust_maximum_inner();

            if is_foveon {
                p.run_stage(ProgressStage::FoveonInterpolate, |s, ctx| s.foveon_interpolate(ctx))?;
            }
            if !p.state.document_mode {
                p.run_stage(ProgressStage::ScaleColors, |s, ctx| s.scale_colors(ctx))?;
            }
            p.run_stage(ProgressStage::PreInterpolate, |s, ctx| s.pre_interpolate(ctx))?;
            if p.options.exposure.is_some() {
                p.exposure_inner()?;
            }
            if p.geometry.filters.is_mosaic() && !p.state.document_mode {
                p.run_stage(ProgressStage::Interpolate, |s, ctx| s.interpolate(ctx))?;
            }
            p.run_stage(ProgressStage::MixGreen, |s, ctx| s.mix_green(ctx))?;
            if !is_foveon && p.geometry.colors == 3 {
                p.run_stage(ProgressStage::MedianFilter, |s, ctx| s.median_filter(ctx))?;
            }
            if p.options.highlight >= 2 {
                p.run_stage(ProgressStage::Highlights, |s, ctx| s.highlights(ctx))?;
            }
            if p.options.use_fuji_rotate {
                p.run_stage(ProgressStage::FujiRotate, |s, ctx| s.fuji_rotate(ctx))?;
            }
            if p.options.apply_profile {
                p.run_stage(ProgressStage::ApplyProfile, |s, ctx| s.apply_profile(ctx))?;
            }
            p.run_stage(ProgressStage::ConvertRgb, |s, ctx| s.convert_to_rgb(ctx))?;
            if p.options.use_fuji_rotate {
                p.run_stage(ProgressStage::Stretch, |s, ctx| s.stretch(ctx))?;
            }

            p.timings.log_summary();
            info!(
                width = p.geometry.iwidth,
                height = p.geometry.iheight,
                colors = p.geometry.colors,
                "Processing complete"
            );
            Ok(())
        })
    }

    /// Computes the output size without decoding pixel data.
    pub fn adjust_sizes_info_only(&mut self) -> Result<()> {
        self.progress.require(ProgressStage::Identify)?;
        self.progress.require_at_most(ProgressStage::Highlights)?;
        self.raw2image_start()?;

        let step = 0.5f64.sqrt();
        let shrink = self.state.shrink as usize;
        let g = &mut self.geometry;
        if self.options.use_fuji_rotate {
            match g.diagonal {
                Some(mut layout) if layout.fuji_width != 0 => {
                    if layout.fheight != 0 {
                        g.height = layout.fheight;
                        g.width = layout.fwidth;
                        g.apply_shrink(shrink != 0);
                        g.raw_height = g.raw_height.saturating_sub(2 * g.top_margin);
                        layout.fheight = 0;
                        layout.fwidth = 0;
                    }
                    layout.fuji_width = (layout.fuji_width - 1 + shrink) >> shrink;
                    g.iwidth = (layout.fuji_width as f64 / step) as usize;
                    g.iheight = (g.iheight.saturating_sub(layout.fuji_width) as f64 / step) as usize;
                    g.diagonal = Some(layout);
                }
                _ => {
                    if g.pixel_aspect < 1.0 {
                        g.iheight = (g.iheight as f64 / g.pixel_aspect + 0.5) as usize;
                    }
                    if g.pixel_aspect > 1.0 {
                        g.iwidth = (g.iwidth as f64 * g.pixel_aspect + 0.5) as usize;
                    }
                }
            }
        }
        self.progress.advance(ProgressStage::FujiRotate)?;
        let g = &mut self.geometry;
        if g.flip & 4 != 0 {
            std::mem::swap(&mut g.width, &mut g.height);
            std::mem::swap(&mut g.iwidth, &mut g.iheight);
            self.progress.advance(ProgressStage::Flip)?;
        }
        debug!(iwidth = self.geometry.iwidth, iheight = self.geometry.iheight, "Output size estimated");
        Ok(())
    }

    /// Describes the decoder selected for the open file.
    pub fn decoder_info(&self) -> Result<DecoderDescriptor> {
        self.progress.require(ProgressStage::Identify)?;
        let id = self.identification_ref()?;
        describe(id.decoder, id.geometry.filters.is_mosaic())
    }

    pub fn mem_image_format(&self) -> MemImageFormat {
        let (width, height) = match self.buffers.image() {
            Some(image) => (image.width, image.height),
            None => (self.geometry.iwidth, self.geometry.iheight),
        };
        MemImageFormat::new(width, height, self.geometry.flip, self.geometry.colors, self.options.output_bps)
    }

    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            flip: self.geometry.flip,
            colors: self.geometry.colors,
            bps: self.options.output_bps,
            bgr: self.options.output_bgr,
            gamma: self.options.gamma,
            bright: self.options.bright,
            auto_bright: !self.options.no_auto_bright && self.options.highlight & !2 == 0,
            half_percentile: self.geometry.diagonal.is_some_and(|d| d.fuji_width != 0),
        }
    }

    fn render_inner(&mut self) -> Result<ProcessedImage> {
        let settings = self.render_settings();
        let image = self
            .buffers
            .image()
            .ok_or_else(|| ProcessingError::Unspecified("image buffer is missing".to_string()))?;
        Ok(output::render(image, &settings)?)
    }

    /// Renders the processed image into an interleaved bitmap.
    pub fn make_mem_image(&mut self) -> Result<ProcessedImage> {
        self.progress.require(ProgressStage::PreInterpolate)?;
        self.require_image()?;
        self.guarded(|p| p.render_inner())
    }

    /// Encodes the processed image as TIFF into `output`.
    #[instrument(skip_all)]
    pub fn write_tiff_to(&mut self, output: &mut dyn Write) -> Result<()> {
        self.progress.require(ProgressStage::PreInterpolate)?;
        self.require_image()?;
        self.guarded(|p| {
            let rendered = p.render_inner()?;
            {
                let _span = info_span!("encode_tiff").entered();
                p.writer.write_tiff(&rendered, output, &p.options.tiff)?;
            }
            info!(width = rendered.width, height = rendered.height, "TIFF written");
            p.progress.advance(ProgressStage::Flip)
        })
    }

    pub fn write_tiff<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.progress.require(ProgressStage::PreInterpolate)?;
        self.require_image()?;
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| ProcessingError::IoError(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        self.write_tiff_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
