// SPDX-License-Identifier: Apache-2.0
//
// Anti-spoofing heuristics — distinguishes a photographed physical passport
// from a photograph of a screen displaying one.
//
// Three independent signals are computed over the raw frame: scanline
// banding, unnaturally flat brightness, and moiré interference. Each signal
// has a *strong* trigger, and the replay verdict requires at least two of
// the three to fire. The conjunction keeps glossy or studio-lit real
// documents from being rejected on a single noisy signal.
//
// Sampling is stride-based, so the verdict is a pure function of the frame.

use tracing::{debug, instrument};
use veriport_core::types::RawFrame;

/// Tuning knobs for the three replay heuristics.
#[derive(Debug, Clone)]
pub struct SpoofThresholds {
    /// Per-row-pair summed channel delta above which two adjacent rows are
    /// counted as "different" at a sample column.
    pub scanline_channel_delta: u32,
    /// Fraction of sampled columns that must differ for a row pair to count
    /// as a scanline.
    pub scanline_row_fraction: f32,
    /// Scanline rows must exceed height divided by this to fire.
    pub scanline_rows_divisor: u32,
    /// Brightness variance below this is an unnaturally flat frame.
    pub brightness_variance_floor: f32,
    /// Summed channel delta below which an offset pixel pair counts as a
    /// moiré near-duplicate.
    pub moire_channel_delta: u32,
    /// Fraction of near-duplicate pairs above which the moiré signal fires.
    pub moire_fraction: f32,
    /// Diagonal sampling offset for the moiré test, in pixels.
    pub moire_offset: u32,
}

impl Default for SpoofThresholds {
    fn default() -> Self {
        Self {
            scanline_channel_delta: 50,
            scanline_row_fraction: 0.2,
            scanline_rows_divisor: 5,
            brightness_variance_floor: 20.0,
            moire_channel_delta: 5,
            moire_fraction: 0.3,
            moire_offset: 2,
        }
    }
}

/// The verdict plus the contributing signal values, for diagnostics and the
/// validation warning list.
#[derive(Debug, Clone, PartialEq)]
pub struct SpoofReport {
    /// Row pairs counted as scanlines.
    pub scanline_rows: u32,
    /// Variance of sampled pixel brightness.
    pub brightness_variance: f32,
    /// Fraction of offset pixel pairs that were near-identical.
    pub moire_fraction: f32,
    /// How many of the three signals fired strongly.
    pub indicators: u8,
    /// True when at least two signals fired.
    pub is_screen_replay: bool,
}

/// Classify a frame as a screen replay or a real document.
#[instrument(skip_all, fields(width = frame.width, height = frame.height))]
pub fn detect_screen_replay(frame: &RawFrame, thresholds: &SpoofThresholds) -> SpoofReport {
    let scanline_rows = count_scanline_rows(frame, thresholds);
    let brightness_variance = sampled_brightness_variance(frame);
    let moire = moire_near_duplicate_fraction(frame, thresholds);

    let scanline_threshold = frame.height / thresholds.scanline_rows_divisor.max(1);
    let strong_scanlines = scanline_rows > scanline_threshold;
    let strong_uniformity = brightness_variance < thresholds.brightness_variance_floor;
    let strong_moire = moire > thresholds.moire_fraction;

    let indicators =
        strong_scanlines as u8 + strong_uniformity as u8 + strong_moire as u8;
    let is_screen_replay = indicators >= 2;

    debug!(
        scanline_rows,
        scanline_threshold,
        brightness_variance,
        moire_fraction = moire,
        indicators,
        is_screen_replay,
        "screen replay heuristics evaluated"
    );

    SpoofReport {
        scanline_rows,
        brightness_variance,
        moire_fraction: moire,
        indicators,
        is_screen_replay,
    }
}

/// Scanline test: compare every other row against its neighbour at every
/// other column; a row pair counts when enough columns differ sharply.
fn count_scanline_rows(frame: &RawFrame, thresholds: &SpoofThresholds) -> u32 {
    if frame.height < 2 || frame.width < 2 {
        return 0;
    }

    let sampled_columns = (frame.width / 2).max(1);
    let mut scanline_rows = 0u32;

    for y in (0..frame.height - 1).step_by(2) {
        let mut differing = 0u32;
        for x in (0..frame.width).step_by(2) {
            let a = frame.pixel(x, y);
            let b = frame.pixel(x, y + 1);
            let diff = a[0].abs_diff(b[0]) as u32
                + a[1].abs_diff(b[1]) as u32
                + a[2].abs_diff(b[2]) as u32;
            if diff > thresholds.scanline_channel_delta {
                differing += 1;
            }
        }
        if differing as f32 / sampled_columns as f32 > thresholds.scanline_row_fraction {
            scanline_rows += 1;
        }
    }

    scanline_rows
}

/// Brightness-uniformity test: variance of mean-channel brightness over a
/// fixed-stride sample of roughly one pixel in fifty.
fn sampled_brightness_variance(frame: &RawFrame) -> f32 {
    let total = (frame.width as usize) * (frame.height as usize);
    if total == 0 {
        return 0.0;
    }
    // Stride 53 (prime) avoids locking onto image structure while staying
    // close to the 1-in-50 sample density.
    let stride = 53usize;

    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut brightnesses = Vec::with_capacity(total / stride + 1);
    let mut idx = 0usize;
    while idx < total {
        let base = idx * 4;
        let b = (frame.rgba[base] as f64 + frame.rgba[base + 1] as f64
            + frame.rgba[base + 2] as f64)
            / 3.0;
        brightnesses.push(b);
        sum += b;
        count += 1;
        idx += stride;
    }

    let mean = sum / count as f64;
    let variance = brightnesses
        .iter()
        .map(|b| (b - mean) * (b - mean))
        .sum::<f64>()
        / count as f64;
    variance as f32
}

/// Moiré test: sample pixels on a fixed grid and compare each against the
/// pixel a small diagonal offset away; screen pixel grids produce an excess
/// of near-identical pairs at such offsets.
fn moire_near_duplicate_fraction(frame: &RawFrame, thresholds: &SpoofThresholds) -> f32 {
    let off = thresholds.moire_offset;
    if frame.width <= off || frame.height <= off {
        return 0.0;
    }

    // Grid stride targeting roughly one sample per 200 pixels.
    let stride = 14u32;
    let mut near_duplicates = 0u32;
    let mut samples = 0u32;

    let mut y = 0u32;
    while y < frame.height - off {
        let mut x = 0u32;
        while x < frame.width - off {
            let a = frame.pixel(x, y);
            let b = frame.pixel(x + off, y + off);
            let diff = a[0].abs_diff(b[0]) as u32
                + a[1].abs_diff(b[1]) as u32
                + a[2].abs_diff(b[2]) as u32;
            if diff < thresholds.moire_channel_delta {
                near_duplicates += 1;
            }
            samples += 1;
            x += stride;
        }
        y += stride;
    }

    if samples == 0 {
        0.0
    } else {
        near_duplicates as f32 / samples as f32
    }
}
