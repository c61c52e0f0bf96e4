//! Separable low-pass filters over Bayer sub-planes.
//!
//! Every filter works on each sub-plane on its own, so colors never mix, except
//! [`green_blur`] which averages a green photosite with its diagonal neighbours.
//! Plane edges are extended by a single half-sample symmetric reflection;
//! taps that fall beyond the reflected copy contribute nothing.

use rayon::prelude::*;

use super::planes::{GreenMode, Plane, QuadPlanes};
use crate::image_pipeline::common::error::Fault;

/// Binomial kernels scaled to 65536, center tap first, for radii 1 through 8.
const BINOMIAL: [[i64; 9]; 8] = [
    [32768, 16384, 0, 0, 0, 0, 0, 0, 0],
    [24576, 16384, 4096, 0, 0, 0, 0, 0, 0],
    [20480, 15360, 6144, 1024, 0, 0, 0, 0, 0],
    [17920, 14336, 7168, 2048, 256, 0, 0, 0, 0],
    [16128, 13440, 7680, 2880, 640, 64, 0, 0, 0],
    [14784, 12672, 7920, 3520, 1056, 192, 16, 0, 0],
    [13728, 12012, 8008, 4004, 1456, 364, 56, 4, 0],
    [12870, 11440, 8008, 4368, 1820, 560, 120, 16, 1],
];

/// Index of tap `x` after reflecting about the plane edges, if it lands inside.
#[inline]
fn reflect(x: isize, n: usize) -> Option<usize> {
    let n = n as isize;
    let x = if x < 0 {
        -1 - x
    } else if x >= n {
        2 * n - 1 - x
    } else {
        x
    };
    (0..n).contains(&x).then_some(x as usize)
}

fn filter_rows<F>(plane: &Plane, f: &F) -> Result<Plane, Fault>
where
    F: Fn(&[u16], &mut [u16]) + Sync,
{
    let mut out = Plane::new(plane.width, plane.height)?;
    if plane.width == 0 {
        return Ok(out);
    }
    out.data
        .par_chunks_mut(plane.width)
        .zip(plane.data.par_chunks(plane.width))
        .for_each(|(dst, src)| f(src, dst));
    Ok(out)
}

/// Runs a 1-D line filter horizontally, then vertically. The intermediate
/// result is stored as 16-bit samples.
fn separable<F>(plane: &Plane, f: F) -> Result<Plane, Fault>
where
    F: Fn(&[u16], &mut [u16]) + Sync,
{
    let horizontal = filter_rows(plane, &f)?;
    filter_rows(&horizontal.transposed()?, &f)?.transposed()
}

fn to_sample(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

/// Binomial (gaussian approximation) blur of `radius` taps on each side.
///
/// Radii outside 1..=8 leave the data as it is.
pub fn binomial(src: &QuadPlanes, radius: usize) -> Result<QuadPlanes, Fault> {
    if !(1..=8).contains(&radius) {
        return src.try_clone();
    }
    let kernel = &BINOMIAL[radius - 1][..=radius];
    src.map(|plane| separable(plane, |line, out| binomial_line(kernel, line, out)))
}

fn binomial_line(kernel: &[i64], src: &[u16], dst: &mut [u16]) {
    let n = src.len();
    for (m, out) in dst.iter_mut().enumerate() {
        let mut acc = kernel[0] * src[m] as i64;
        for (k, &weight) in kernel.iter().enumerate().skip(1) {
            let (m, k) = (m as isize, k as isize);
            for x in [m - k, m + k] {
                if let Some(j) = reflect(x, n) {
                    acc += weight * src[j] as i64;
                }
            }
        }
        *out = to_sample(acc >> 16);
    }
}

/// Divisors applied after each box pass.
///
/// Division is deferred while the product of the box widths stays below 65535;
/// a pass that would overflow that bound divides by the next width instead and
/// the last pass divides by the accumulated product.
fn block_dividers(radii: &[usize]) -> Vec<i64> {
    let widths: Vec<i64> = radii.iter().map(|&r| 2 * r as i64 + 1).collect();
    let mut dividers = vec![1; widths.len()];
    let Some(&first) = widths.first() else {
        return dividers;
    };
    let mut product = first;
    for i in 1..widths.len() {
        if product * widths[i] < 65535 {
            product *= widths[i];
        } else {
            dividers[i - 1] = widths[i];
        }
    }
    if let Some(last) = dividers.last_mut() {
        *last = product;
    }
    dividers
}

/// Repeated box blur, one pass per entry of `radii`.
///
/// Three passes of the same radius approximate a gaussian; the passes of one
/// direction run at full precision and only the result is stored as 16-bit.
pub fn block(src: &QuadPlanes, radii: &[usize]) -> Result<QuadPlanes, Fault> {
    if radii.is_empty() {
        return src.try_clone();
    }
    let dividers = block_dividers(radii);
    src.map(|plane| separable(plane, |line, out| block_line(radii, &dividers, line, out)))
}

fn block_line(radii: &[usize], dividers: &[i64], src: &[u16], dst: &mut [u16]) {
    let n = src.len();
    if n == 0 {
        return;
    }
    let mut line: Vec<i64> = src.iter().map(|&v| v as i64).collect();
    let mut prefix = vec![0i64; n + 1];
    for (&radius, &divider) in radii.iter().zip(dividers) {
        for (i, &value) in line.iter().enumerate() {
            prefix[i + 1] = prefix[i] + value;
        }
        for (m, value) in line.iter_mut().enumerate() {
            *value = window_sum(&prefix, m, radius, n) / divider;
        }
    }
    for (out, &value) in dst.iter_mut().zip(&line) {
        *out = to_sample(value);
    }
}

/// Sum of the reflected line over `[m - r, m + r]`, read from its prefix sums.
fn window_sum(prefix: &[i64], m: usize, r: usize, n: usize) -> i64 {
    let sum = |lo: usize, hi: usize| prefix[hi + 1] - prefix[lo];
    let mut total = sum(m.saturating_sub(r), (m + r).min(n - 1));
    if r > m {
        total += sum(0, (r - m - 1).min(n - 1));
    }
    if m + r >= n {
        total += sum((2 * n - 1).saturating_sub(m + r), n - 1);
    }
    total
}

/// Mirrors across the edge sample itself: -1 maps to 1 and `n` to `n - 2`.
#[inline]
fn mirror(x: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let x = if x < 0 {
        -x
    } else if x > last {
        2 * last - x
    } else {
        x
    };
    x.clamp(0, last.max(0)) as usize
}

/// X-shaped blur of the green photosites:
///
/// ```text
/// 1   1
///   4
/// 1   1
/// ```
///
/// divided by 8. Red and blue photosites are copied.
pub fn green_blur(src: &QuadPlanes, mode: GreenMode) -> Result<QuadPlanes, Fault> {
    let mut out = src.try_clone()?;
    let (height, width) = (src.height, src.width);
    for (i, plane) in out.planes.iter_mut().enumerate() {
        if !mode.is_green_plane(i) || plane.width == 0 {
            continue;
        }
        let (dy, dx) = (i >> 1, i & 1);
        let plane_width = plane.width;
        plane.data.par_chunks_mut(plane_width).enumerate().for_each(|(pr, line)| {
            let row = (2 * pr + dy) as isize;
            let (up, down) = (mirror(row - 1, height), mirror(row + 1, height));
            for (pc, value) in line.iter_mut().enumerate() {
                let col = (2 * pc + dx) as isize;
                let (left, right) = (mirror(col - 1, width), mirror(col + 1, width));
                let sum = 4 * src.get(row as usize, col as usize) as u32
                    + src.get(up, left) as u32
                    + src.get(up, right) as u32
                    + src.get(down, left) as u32
                    + src.get(down, right) as u32;
                *value = (sum >> 3) as u16;
            }
        });
    }
    Ok(out)
}
