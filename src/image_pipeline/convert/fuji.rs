//! 45° derotation of diagonal (SuperCCD) sensors.
//!
//! Black subtraction happens in the same pass, so the rotated image comes out
//! normalized and the color state is updated accordingly.

use tracing::debug;

use crate::image_pipeline::buffers::BufferManager;
use crate::image_pipeline::common::error::Fault;
use crate::image_pipeline::raw::color::ColorState;
use crate::image_pipeline::raw::geometry::SensorGeometry;
use crate::image_pipeline::raw::types::RawBuffer;

pub(super) fn derotate(
    buffers: &mut BufferManager,
    geometry: &mut SensorGeometry,
    color: &mut ColorState,
    shrink: bool,
) -> Result<(), Fault> {
    let layout = geometry
        .diagonal
        .ok_or_else(|| Fault::DecodeRaw("sensor is not diagonal".to_string()))?;
    let s = shrink as usize;
    let out_width = (layout.fwidth + s) >> s;
    let out_height = (layout.fheight + s) >> s;

    let (raw, image) = buffers.raw_and_image(out_width, out_height)?;
    let (data, stride) = match raw {
        RawBuffer::Bayer { data, width, .. } => (data, *width),
        _ => return Err(Fault::DecodeRaw("diagonal sensors need single-plane raw data".to_string())),
    };
    if geometry.left_margin + geometry.width > stride
        || (geometry.top_margin + geometry.height) * stride > data.len()
    {
        return Err(Fault::DecodeRaw("diagonal sensor window exceeds raw buffer".to_string()));
    }

    let cblk = color.combined_black();
    let mut channel_maximum = [0u32; 4];
    for row in 0..geometry.height {
        let base = (row + geometry.top_margin) * stride + geometry.left_margin;
        for (col, &sample) in data[base..base + geometry.width].iter().enumerate() {
            let (r, c) = layout.derotate(row, col);
            if r < 0 || c < 0 {
                continue;
            }
            let (r, c) = (r as usize, c as usize);
            let (dest_row, dest_col) = (r >> s, c >> s);
            if dest_row >= out_height || dest_col >= out_width {
                continue;
            }
            let cc = geometry.filters.color(r, c);
            let value = (sample as u32).saturating_sub(cblk[cc]);
            image.pixels[dest_row * out_width + dest_col][cc] = value as u16;
            channel_maximum[cc] = channel_maximum[cc].max(value);
        }
    }

    color.maximum = color.maximum.saturating_sub(color.black);
    color.cblack = [0; 4];
    color.black = 0;
    color.channel_maximum = channel_maximum;

    geometry.height = layout.fheight;
    geometry.width = layout.fwidth;
    geometry.apply_shrink(shrink);
    geometry.raw_height = geometry.raw_height.saturating_sub(2 * geometry.top_margin);
    debug!(width = geometry.width, height = geometry.height, "Derotated diagonal sensor");
    Ok(())
}
