// SPDX-License-Identifier: Apache-2.0
//
// Portrait matching between the document photo and a live capture.
//
// Matching is encoder-agnostic: a [`FaceEncoder`] turns an image into a
// fixed-length embedding, and the matcher scores two embeddings by cosine
// similarity mapped into [0, 1]. The built-in [`GridEncoder`] is a
// deterministic appearance descriptor (mean-centred 8x8 luma grid), adequate
// for same-session comparisons; a neural encoder can be dropped in behind
// the same trait without touching the flow.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, instrument};
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::FaceMatchResult;

use super::detect::detect_face;

/// Fixed-length face descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEmbedding(pub Vec<f32>);

/// Turns a face-bearing image into an embedding.
///
/// Returns `Ok(None)` when no face is present in the image, which the
/// matcher surfaces as a recognition error rather than a zero score.
pub trait FaceEncoder: Send + Sync {
    fn encode(&self, image: &DynamicImage) -> Result<Option<FaceEmbedding>>;
}

/// Mean-centred, L2-normalised luma grid descriptor.
///
/// The image is resized to `grid x grid`, converted to grayscale, and the
/// cell values are centred on their mean. Insensitive to uniform brightness
/// shifts; sensitive to the coarse light/dark structure of a face.
#[derive(Debug, Clone)]
pub struct GridEncoder {
    grid: u32,
}

impl GridEncoder {
    pub fn new(grid: u32) -> Self {
        Self { grid: grid.max(2) }
    }
}

impl Default for GridEncoder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl FaceEncoder for GridEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Option<FaceEmbedding>> {
        if !detect_face(image).detected {
            return Ok(None);
        }

        let small = image.resize_exact(self.grid, self.grid, FilterType::Triangle);
        let luma = small.to_luma8();

        let values: Vec<f32> = luma.pixels().map(|p| p.0[0] as f32).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let centred: Vec<f32> = values.iter().map(|v| v - mean).collect();

        let norm = centred.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            // Perfectly flat crop carries no structure to match against.
            return Ok(None);
        }
        let normalised = centred.iter().map(|v| v / norm).collect();
        Ok(Some(FaceEmbedding(normalised)))
    }
}

/// Scores document-photo against live-capture faces.
pub struct FaceMatcher {
    encoder: Box<dyn FaceEncoder>,
    threshold: f32,
}

impl FaceMatcher {
    pub fn new(encoder: Box<dyn FaceEncoder>, threshold: f32) -> Self {
        Self { encoder, threshold }
    }

    /// Matcher with the default grid encoder.
    pub fn with_default_encoder(threshold: f32) -> Self {
        Self::new(Box::new(GridEncoder::default()), threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compare the document portrait against a live face capture.
    ///
    /// # Errors
    ///
    /// [`VeriportError::RecognitionFailed`] when either image contains no
    /// detectable face. An absent face is an error, never a zero score, so
    /// callers cannot confuse "no face" with "different face".
    #[instrument(skip_all)]
    pub fn match_faces(
        &self,
        document_photo: &DynamicImage,
        live_capture: &DynamicImage,
    ) -> Result<FaceMatchResult> {
        let doc = self.encoder.encode(document_photo)?.ok_or_else(|| {
            VeriportError::RecognitionFailed("no face detected in document photo".to_string())
        })?;
        let live = self.encoder.encode(live_capture)?.ok_or_else(|| {
            VeriportError::RecognitionFailed("no face detected in live capture".to_string())
        })?;

        let score = similarity(&doc, &live);
        debug!(score, threshold = self.threshold, "face match scored");
        Ok(FaceMatchResult { score })
    }

    /// Convenience wrapper: score plus accept/reject against the threshold.
    pub fn verify(
        &self,
        document_photo: &DynamicImage,
        live_capture: &DynamicImage,
    ) -> Result<(FaceMatchResult, bool)> {
        let result = self.match_faces(document_photo, live_capture)?;
        Ok((result, result.accepted(self.threshold)))
    }
}

/// Cosine similarity of two embeddings, mapped from [-1, 1] into [0, 1].
fn similarity(a: &FaceEmbedding, b: &FaceEmbedding) -> f32 {
    let len = a.0.len().min(b.0.len());
    let dot: f32 = a.0[..len].iter().zip(&b.0[..len]).map(|(x, y)| x * y).sum();
    ((dot + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Synthetic portrait: skin-toned background with a dark feature band
    /// whose position is controlled by `offset`.
    fn portrait(offset: u32) -> DynamicImage {
        let (w, h) = (64u32, 64u32);
        let mut img = RgbImage::new(w, h);
        for p in img.pixels_mut() {
            *p = Rgb([200, 150, 130]);
        }
        for y in offset..(offset + 8).min(h) {
            for x in 0..w {
                img.put_pixel(x, y, Rgb([40, 30, 25]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn no_face() -> DynamicImage {
        let mut img = RgbImage::new(64, 64);
        for p in img.pixels_mut() {
            *p = Rgb([30, 60, 200]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_portraits_score_high() {
        let matcher = FaceMatcher::with_default_encoder(0.70);
        let result = matcher.match_faces(&portrait(16), &portrait(16)).unwrap();
        assert!(result.score > 0.95, "score: {}", result.score);
        assert!(result.accepted(0.70));
    }

    #[test]
    fn different_structure_scores_lower() {
        let matcher = FaceMatcher::with_default_encoder(0.70);
        let same = matcher.match_faces(&portrait(16), &portrait(16)).unwrap();
        let diff = matcher.match_faces(&portrait(8), &portrait(48)).unwrap();
        assert!(diff.score < same.score);
    }

    #[test]
    fn missing_face_is_an_error_not_zero() {
        let matcher = FaceMatcher::with_default_encoder(0.70);
        let err = matcher.match_faces(&portrait(16), &no_face()).unwrap_err();
        assert!(matches!(err, VeriportError::RecognitionFailed(_)));
        let err = matcher.match_faces(&no_face(), &portrait(16)).unwrap_err();
        assert!(matches!(err, VeriportError::RecognitionFailed(_)));
    }

    #[test]
    fn verify_applies_threshold() {
        let matcher = FaceMatcher::with_default_encoder(0.70);
        let (result, accepted) = matcher.verify(&portrait(16), &portrait(16)).unwrap();
        assert!(accepted);
        assert!(result.score >= 0.70);
    }

    #[test]
    fn grid_encoder_is_deterministic() {
        let enc = GridEncoder::default();
        let a = enc.encode(&portrait(16)).unwrap().unwrap();
        let b = enc.encode(&portrait(16)).unwrap().unwrap();
        assert_eq!(a, b);
    }
}
