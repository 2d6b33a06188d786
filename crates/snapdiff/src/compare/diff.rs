use super::buffer::{BYTES_PER_PIXEL, PixelBuffer, channels, rgba};
use super::hash::PositionalHash;
use super::overlay::LowResGrid;
use super::{DiffResult, MISSING_BASELINE, MISSING_CANDIDATE};
use crate::store::load::{LoadedImage, Viewport};

/// Fraction of the maximum brightness difference tolerated by default.
pub const DEFAULT_THRESHOLD: f64 = 0.03;

/// Solid color marking mismatched pixels (opaque magenta).
pub const HIGHLIGHT: u32 = rgba(255, 0, 255, 255);

/// Positional hash row stride. Larger than any plausible row width.
pub const HASH_SPREAD: u64 = 1_000_000;

const WHITE_RGB: u32 = 0x00FF_FFFF;

/// Tunables of the diff engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Tolerated brightness difference as a fraction of 255, clamped to 0..=1.
    pub threshold: f64,
    /// Packed color written for mismatched pixels.
    pub highlight: u32,
    pub spread: u64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            highlight: HIGHLIGHT,
            spread: HASH_SPREAD,
        }
    }
}

impl DiffOptions {
    pub fn with_threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }

    /// Brightness difference at or above which a pixel is a mismatch.
    pub fn brightness_threshold(&self) -> f64 {
        let t = if self.threshold.is_nan() {
            DEFAULT_THRESHOLD
        } else {
            self.threshold.clamp(0.0, 1.0)
        };
        255.0 * t
    }
}

/// Result of a comparison together with its triptych canvas
/// (baseline | diff | candidate).
pub struct DiffOutcome {
    pub result: DiffResult,
    pub canvas: PixelBuffer,
}

type Region<'a> = (&'a PixelBuffer, Viewport);

/// Compare two loaded images.
///
/// Returns `None` when neither image exists, or when the triptych would be
/// wider than `u32::MAX`. When only one exists, the diff panel is solid
/// highlight and the result carries the matching sentinel.
///
/// Runs synchronously; call via `spawn_blocking` from async code.
pub fn diff(
    baseline: &LoadedImage,
    candidate: &LoadedImage,
    options: &DiffOptions,
) -> Option<DiffOutcome> {
    let base = baseline.region();
    let cand = candidate.region();

    let (width, height) = match (base, cand) {
        (None, None) => return None,
        (Some((_, b)), None) => (b.width, b.height),
        (None, Some((_, c))) => (c.width, c.height),
        (Some((_, b)), Some((_, c))) => (b.width.max(c.width), b.height.max(c.height)),
    };
    let canvas = PixelBuffer::new(width.checked_mul(3)?, height);

    let outcome = match (base, cand) {
        (Some(base), Some(cand)) => compare_both(canvas, base, cand, width, height, options),
        _ => one_sided(canvas, base, cand, width, height, options),
    };
    Some(outcome)
}

fn one_sided(
    mut canvas: PixelBuffer,
    base: Option<Region<'_>>,
    cand: Option<Region<'_>>,
    width: u32,
    height: u32,
    options: &DiffOptions,
) -> DiffOutcome {
    for y in 0..height {
        canvas.fill_span(width, y, width, options.highlight);
        if let Some(region) = base {
            copy_row(&mut canvas, region, y, 0, width);
        }
        if let Some(region) = cand {
            copy_row(&mut canvas, region, y, 2 * width, width);
        }
    }

    let mismatched_pixels = if base.is_none() {
        MISSING_BASELINE
    } else {
        MISSING_CANDIDATE
    };
    DiffOutcome {
        result: DiffResult {
            mismatched_pixels,
            diff_hash: 0,
        },
        canvas,
    }
}

fn compare_both(
    mut canvas: PixelBuffer,
    base: Region<'_>,
    cand: Region<'_>,
    width: u32,
    height: u32,
    options: &DiffOptions,
) -> DiffOutcome {
    let limit = options.brightness_threshold();
    let right = 2 * width;
    let mut grid = LowResGrid::new(width, height);
    let mut hash = PositionalHash::new(options.spread);
    let mut mismatched: i64 = 0;

    for y in 0..height {
        let base_len = copy_row(&mut canvas, base, y, 0, width);
        let cand_len = copy_row(&mut canvas, cand, y, right, width);

        // Columns past both copied spans have nothing to compare.
        for x in 0..base_len.max(cand_len) {
            let has_base = x < base_len;
            let has_cand = x < cand_len;
            let b = canvas.pixel(x, y);
            let c = canvas.pixel(right + x, y);

            if has_base && has_cand && (b == c || brightness_delta(b, c) < limit) {
                canvas.set_pixel(width + x, y, wash_out(b));
                continue;
            }

            mismatched += 1;
            canvas.set_pixel(width + x, y, options.highlight);
            grid.mark(x, y);
            hash.record(x, y);

            if (x + y) % 2 == 1 {
                if has_cand && !is_white(c) {
                    canvas.set_pixel(right + x, y, tint_red(c));
                }
            } else if has_base && !is_white(b) {
                canvas.set_pixel(x, y, tint_green(b));
            }
        }
    }

    if mismatched > 0 {
        grid.apply(&mut canvas, width, width, height, options.highlight);
    }

    DiffOutcome {
        result: DiffResult {
            mismatched_pixels: mismatched,
            diff_hash: hash.finish(),
        },
        canvas,
    }
}

/// Copy row `y` of a viewport into the canvas panel starting at `panel_x`.
/// Returns how many pixels were copied (0 when the row is outside the source).
fn copy_row(
    canvas: &mut PixelBuffer,
    (image, vp): Region<'_>,
    y: u32,
    panel_x: u32,
    width: u32,
) -> u32 {
    if y >= vp.height || vp.x >= image.width() {
        return 0;
    }
    let Some(src_y) = vp.y.checked_add(y).filter(|&sy| sy < image.height()) else {
        return 0;
    };
    let len = vp.width.min(width).min(image.width() - vp.x);

    let src_start = vp.x as usize * BYTES_PER_PIXEL;
    let src = &image.row(src_y)[src_start..src_start + len as usize * BYTES_PER_PIXEL];
    let dst_start = panel_x as usize * BYTES_PER_PIXEL;
    canvas.row_mut(y)[dst_start..dst_start + src.len()].copy_from_slice(src);
    len
}

/// Luma-weighted absolute channel difference. Alpha is ignored.
fn brightness_delta(a: u32, b: u32) -> f64 {
    let [ar, ag, ab, _] = channels(a);
    let [br, bg, bb, _] = channels(b);
    0.299 * f64::from(ar.abs_diff(br))
        + 0.587 * f64::from(ag.abs_diff(bg))
        + 0.114 * f64::from(ab.abs_diff(bb))
}

/// Halve RGB and lift it by 128: a light, de-emphasized copy.
fn wash_out(p: u32) -> u32 {
    ((p >> 1) & 0x007F_7F7F) | 0xFF80_8080
}

fn tint_red(p: u32) -> u32 {
    ((p >> 1) & 0x007F_7F7F) | rgba(0x80, 0, 0, 0xFF)
}

fn tint_green(p: u32) -> u32 {
    ((p >> 1) & 0x007F_7F7F) | rgba(0, 0x80, 0, 0xFF)
}

fn is_white(p: u32) -> bool {
    p & WHITE_RGB == WHITE_RGB
}
