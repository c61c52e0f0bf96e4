//! Output tone curve.

/// Histogram bins per channel, covering the 16-bit range in steps of 8.
pub const HISTOGRAM_SIZE: usize = 0x2000;

/// Power-law curve with a linear toe, as used for BT.709 style output.
///
/// `power` is the exponent of the segment above the toe (0.45 for BT.709) and
/// `toe_slope` the slope of the linear segment (4.5). Inputs at or above `white`
/// map to 65535.
pub fn gamma_curve(power: f64, toe_slope: f64, white: u32) -> Vec<u16> {
    let g = solve(power, toe_slope);
    let white = white.max(1) as f64;
    (0..=u16::MAX as usize)
        .map(|i| {
            let r = i as f64 / white;
            if r >= 1.0 {
                return u16::MAX;
            }
            let v = if r < g.toe_end {
                r * toe_slope
            } else if power != 0.0 {
                r.powf(power) * (1.0 + g.offset) - g.offset
            } else {
                r.ln() * g.toe_start + 1.0
            };
            (65536.0 * v).clamp(0.0, u16::MAX as f64) as u16
        })
        .collect()
}

struct CurveParams {
    /// Output value where the linear toe ends.
    toe_start: f64,
    /// Input value where the linear toe ends.
    toe_end: f64,
    offset: f64,
}

/// Finds the toe end that makes the curve continuous with a continuous slope.
fn solve(power: f64, toe_slope: f64) -> CurveParams {
    let mut bounds = [0.0f64, 0.0];
    bounds[(toe_slope >= 1.0) as usize] = 1.0;
    let mut g = CurveParams { toe_start: 0.0, toe_end: 0.0, offset: 0.0 };
    if toe_slope != 0.0 && (toe_slope - 1.0) * (power - 1.0) <= 0.0 {
        for _ in 0..48 {
            g.toe_start = (bounds[0] + bounds[1]) / 2.0;
            let upper = if power != 0.0 {
                ((g.toe_start / toe_slope).powf(-power) - 1.0) / power - 1.0 / g.toe_start > -1.0
            } else {
                g.toe_start / (1.0 - 1.0 / g.toe_start).exp() < toe_slope
            };
            bounds[upper as usize] = g.toe_start;
        }
        g.toe_end = g.toe_start / toe_slope;
        if power != 0.0 {
            g.offset = g.toe_start * (1.0 / power - 1.0);
        }
    }
    g
}

/// White level that leaves 1% of the pixels clipped, in 16-bit units.
///
/// `histogram[c][v]` counts samples of channel `c` with value `v >> 3`.
pub fn auto_white(histogram: &[Vec<u32>], pixels: usize) -> u32 {
    let percentile = (pixels as f64 * 0.01) as u64;
    let mut white = 0;
    for channel in histogram {
        let mut total = 0u64;
        let mut val = HISTOGRAM_SIZE;
        loop {
            val -= 1;
            if val <= 32 {
                break;
            }
            total += channel[val] as u64;
            if total > percentile {
                break;
            }
        }
        white = white.max(val as u32);
    }
    white << 3
}
