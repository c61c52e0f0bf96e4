//! Processing strategy collaborators.
//!
//! The orchestrator calls these at fixed points of the pipeline. Each method
//! works on the session's canonical image through a [`StageContext`].

mod resample;
mod standard;

use tracing::debug;

use crate::image_pipeline::buffers::ImageBuffer;
use crate::image_pipeline::options::ProcessingOptions;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;

pub use standard::StandardStrategies;

/// Per-run switches derived from the options and the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineState {
    /// The image holds a decimated mosaic.
    pub shrink: bool,
    /// Average the two greens after interpolation.
    pub mix_green: bool,
    pub four_color_rgb: bool,
    pub document_mode: bool,
    /// Interpolation quality.
    pub quality: i32,
}

/// Everything a strategy may read or change.
pub struct StageContext<'a> {
    pub image: &'a mut ImageBuffer,
    pub geometry: &'a mut SensorGeometry,
    pub color: &'a mut ColorState,
    pub options: &'a ProcessingOptions,
    pub state: &'a mut PipelineState,
}

pub trait ProcessingStrategies {
    /// Replaces isolated zero photosites by the average of their same-color neighbours.
    fn remove_zeroes(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    fn bad_pixels(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!(list = ?ctx.options.bad_pixels, "No dead pixel correction available");
        Ok(())
    }

    fn dark_frame(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!(frame = ?ctx.options.dark_frame, "No dark frame subtraction available");
        Ok(())
    }

    fn foveon_interpolate(&self, _ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!("No Foveon interpolation available");
        Ok(())
    }

    /// White balance and scaling to the full 16-bit range.
    fn scale_colors(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    /// Undoes or finalizes decimation and prepares the filter pattern for interpolation.
    fn pre_interpolate(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    fn interpolate(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    fn mix_green(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        if !ctx.state.mix_green {
            return Ok(());
        }
        for px in ctx.image.pixels.iter_mut() {
            px[1] = ((px[1] as u32 + px[3] as u32) >> 1) as u16;
        }
        ctx.geometry.colors = 3;
        Ok(())
    }

    fn median_filter(&self, _ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!("No median filter available");
        Ok(())
    }

    fn highlights(&self, ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!(mode = ctx.options.highlight, "No highlight recovery available");
        Ok(())
    }

    /// Derotates a diagonal sensor image onto a square grid.
    fn fuji_rotate(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    fn apply_profile(&self, _ctx: &mut StageContext) -> anyhow::Result<()> {
        debug!("No color profile transform available");
        Ok(())
    }

    fn convert_to_rgb(&self, ctx: &mut StageContext) -> anyhow::Result<()>;

    /// Resamples non-square pixels to a square grid.
    fn stretch(&self, ctx: &mut StageContext) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) struct Fixture {
    pub image: ImageBuffer,
    pub geometry: SensorGeometry,
    pub color: ColorState,
    pub options: ProcessingOptions,
    pub state: PipelineState,
}

#[cfg(test)]
impl Fixture {
    pub fn new(image: ImageBuffer, geometry: SensorGeometry) -> Self {
        Self {
            image,
            geometry,
            color: ColorState::default(),
            options: ProcessingOptions::default(),
            state: PipelineState::default(),
        }
    }

    pub fn ctx(&mut self) -> StageContext<'_> {
        StageContext {
            image: &mut self.image,
            geometry: &mut self.geometry,
            color: &mut self.color,
            options: &self.options,
            state: &mut self.state,
        }
    }
}
