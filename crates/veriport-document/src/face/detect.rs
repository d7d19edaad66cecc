// SPDX-License-Identifier: Apache-2.0
//
// Face presence detection.
//
// A lightweight skin-tone heuristic, not a landmark detector: it answers
// "does this crop plausibly contain a face" cheaply enough to run on every
// candidate frame. Sampling is stride-based so the answer is a pure function
// of the image.

use image::DynamicImage;
use tracing::{debug, instrument};

/// Fraction of sampled pixels that must read as skin for a detection.
const SKIN_FRACTION_THRESHOLD: f32 = 0.2;

/// Outcome of the face presence check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    pub detected: bool,
    /// Fraction of sampled pixels classified as skin, in [0, 1].
    pub confidence: f32,
}

/// Classify an RGB sample as skin tone.
///
/// Red-dominant, moderately saturated pixels: the classic RGB-space rule
/// tuned for portrait crops under ordinary lighting.
fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && (max - min) < 80 && r > g && r > b
}

/// Decide whether an image region contains a face.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn detect_face(image: &DynamicImage) -> FaceDetection {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return FaceDetection {
            detected: false,
            confidence: 0.0,
        };
    }

    // One sample per ~8x8 block keeps the scan cheap on full frames.
    let stride = 8u32;
    let mut skin = 0u32;
    let mut samples = 0u32;

    let mut y = 0u32;
    while y < height {
        let mut x = 0u32;
        while x < width {
            let p = rgb.get_pixel(x, y);
            if is_skin(p[0], p[1], p[2]) {
                skin += 1;
            }
            samples += 1;
            x += stride;
        }
        y += stride;
    }

    let confidence = skin as f32 / samples as f32;
    let detected = confidence > SKIN_FRACTION_THRESHOLD;
    debug!(confidence, detected, "face presence check");

    FaceDetection {
        detected,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for p in img.pixels_mut() {
            *p = Rgb(color);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn skin_toned_region_is_detected() {
        let img = solid(160, 160, [200, 150, 130]);
        let det = detect_face(&img);
        assert!(det.detected);
        assert!(det.confidence > 0.9);
    }

    #[test]
    fn blue_region_is_not_detected() {
        let img = solid(160, 160, [30, 60, 200]);
        let det = detect_face(&img);
        assert!(!det.detected);
        assert_eq!(det.confidence, 0.0);
    }

    #[test]
    fn sparse_skin_below_threshold() {
        // Skin tone in the top-left 10% only.
        let mut img = RgbImage::new(160, 160);
        for p in img.pixels_mut() {
            *p = Rgb([30, 60, 200]);
        }
        for y in 0..16 {
            for x in 0..160 {
                img.put_pixel(x, y, Rgb([200, 150, 130]));
            }
        }
        let det = detect_face(&DynamicImage::ImageRgb8(img));
        assert!(!det.detected, "confidence: {}", det.confidence);
    }

    #[test]
    fn detection_is_deterministic() {
        let img = solid(123, 97, [200, 150, 130]);
        assert_eq!(detect_face(&img), detect_face(&img));
    }
}
