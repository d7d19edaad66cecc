// SPDX-License-Identifier: Apache-2.0
//
// OCR adapter for the machine-readable zone.
//
// The decoder only needs candidate text lines, so recognition sits behind the
// [`TextRecognizer`] trait. The default production implementation wraps the
// `ocrs` crate (pure-Rust OCR backed by neural network models executed via
// `rten`) and is gated behind the `ocr` feature:
//
// ```toml
// veriport-document = { path = "crates/veriport-document", features = ["ocr"] }
// ```
//
// The engine requires two ONNX-derived model files, `text-detection.rten` and
// `text-recognition.rten`, cached under `$XDG_CACHE_HOME/ocrs` (typically
// `~/.cache/ocrs`). Running `ocrs-cli` once downloads them.

use image::DynamicImage;
use tracing::{debug, instrument};
use veriport_core::error::Result;

/// The character set an MRZ line may contain.
pub const MRZ_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// Raw recognition output before MRZ-specific filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// Recognised lines, top to bottom.
    pub lines: Vec<String>,
    /// Engine confidence in [0, 1]. Engines that expose no per-line
    /// confidence report a fixed estimate.
    pub confidence: f32,
}

/// Extracts text lines from an enhanced MRZ region.
///
/// Implementations are synchronous; the flow driver moves them off the async
/// runtime when needed.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, region: &DynamicImage) -> Result<RecognizedText>;
}

/// Keep only lines that plausibly belong to a machine-readable zone.
///
/// Each line is uppercased and stripped of whitespace first. A line survives
/// when its length is in [25, 60] and it either contains the `<` filler or a
/// run of six consecutive digits (the date fields). Misrecognised fillers are
/// normalised: the engine commonly reads `<` as `«`, `(` or `{`.
#[instrument(skip_all, fields(input_lines = lines.len()))]
pub fn filter_mrz_lines(lines: &[String]) -> Vec<String> {
    let mut survivors = Vec::new();
    for raw in lines {
        let line: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c.to_ascii_uppercase() {
                '«' | '(' | '{' | '[' => '<',
                up => up,
            })
            .collect();

        if line.len() < 25 || line.len() > 60 {
            continue;
        }
        if line.contains('<') || has_digit_run(&line, 6) {
            survivors.push(line);
        }
    }
    debug!(surviving = survivors.len(), "filtered MRZ candidate lines");
    survivors
}

fn has_digit_run(line: &str, run: usize) -> bool {
    let mut count = 0usize;
    for c in line.chars() {
        if c.is_ascii_digit() {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            count = 0;
        }
    }
    false
}

/// Recognizer that replays a fixed script — for wiring tests and demos
/// without OCR models.
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    lines: Vec<String>,
    confidence: f32,
}

impl ScriptedRecognizer {
    pub fn new(lines: Vec<String>, confidence: f32) -> Self {
        Self { lines, confidence }
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _region: &DynamicImage) -> Result<RecognizedText> {
        Ok(RecognizedText {
            lines: self.lines.clone(),
            confidence: self.confidence,
        })
    }
}

#[cfg(feature = "ocr")]
pub use self::engine::{MrzOcrConfig, OcrsRecognizer};

#[cfg(feature = "ocr")]
mod engine {
    use std::path::{Path, PathBuf};

    use image::DynamicImage;
    use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
    use rten::Model;
    use tracing::{info, instrument};
    use veriport_core::error::{Result, VeriportError};

    use super::{RecognizedText, TextRecognizer};

    const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
    const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

    fn default_model_dir() -> PathBuf {
        if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            PathBuf::from(xdg).join("ocrs")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".cache").join("ocrs")
        } else {
            PathBuf::from("ocrs-models")
        }
    }

    /// Model file locations for the `ocrs` engine.
    #[derive(Debug, Clone)]
    pub struct MrzOcrConfig {
        pub detection_model_path: PathBuf,
        pub recognition_model_path: PathBuf,
    }

    impl Default for MrzOcrConfig {
        fn default() -> Self {
            let dir = default_model_dir();
            Self {
                detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
                recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            }
        }
    }

    impl MrzOcrConfig {
        /// Point at a directory containing both model files.
        pub fn from_dir(dir: impl AsRef<Path>) -> Self {
            let dir = dir.as_ref();
            Self {
                detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
                recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            }
        }

        /// Verify both model files exist before paying the load cost.
        pub fn validate(&self) -> Result<()> {
            for path in [&self.detection_model_path, &self.recognition_model_path] {
                if !path.exists() {
                    return Err(VeriportError::RecognitionFailed(format!(
                        "OCR model not found at {}; run `ocrs-cli` once to download models",
                        path.display()
                    )));
                }
            }
            Ok(())
        }
    }

    /// [`TextRecognizer`] backed by the `ocrs` neural OCR engine.
    ///
    /// Model loading is the expensive step; construct once and reuse. The
    /// `ocrs` and `rten` crates must be compiled in release mode, debug
    /// builds are 10-100x slower.
    pub struct OcrsRecognizer {
        engine: OcrEngine,
    }

    impl OcrsRecognizer {
        #[instrument(skip_all, fields(
            detection = %config.detection_model_path.display(),
            recognition = %config.recognition_model_path.display(),
        ))]
        pub fn new(config: MrzOcrConfig) -> Result<Self> {
            config.validate()?;

            info!("loading OCR detection model");
            let detection_model = Model::load_file(&config.detection_model_path)
                .map_err(|err| {
                    VeriportError::RecognitionFailed(format!(
                        "failed to load detection model from {}: {err}",
                        config.detection_model_path.display()
                    ))
                })?;

            info!("loading OCR recognition model");
            let recognition_model = Model::load_file(&config.recognition_model_path)
                .map_err(|err| {
                    VeriportError::RecognitionFailed(format!(
                        "failed to load recognition model from {}: {err}",
                        config.recognition_model_path.display()
                    ))
                })?;

            let engine = OcrEngine::new(OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|err| {
                VeriportError::RecognitionFailed(format!(
                    "failed to initialise OCR engine: {err}"
                ))
            })?;

            Ok(Self { engine })
        }

        pub fn with_defaults() -> Result<Self> {
            Self::new(MrzOcrConfig::default())
        }
    }

    impl TextRecognizer for OcrsRecognizer {
        fn recognize(&self, region: &DynamicImage) -> Result<RecognizedText> {
            let rgb = region.to_rgb8();
            let (width, height) = rgb.dimensions();

            let source = ImageSource::from_bytes(rgb.as_raw(), (width, height))
                .map_err(|err| {
                    VeriportError::RecognitionFailed(format!(
                        "failed to create image source ({width}x{height}): {err}"
                    ))
                })?;

            let input = self.engine.prepare_input(source).map_err(|err| {
                VeriportError::RecognitionFailed(format!("OCR preprocessing failed: {err}"))
            })?;

            let text = self.engine.get_text(&input).map_err(|err| {
                VeriportError::RecognitionFailed(format!("OCR recognition failed: {err}"))
            })?;

            let lines: Vec<String> = text
                .lines()
                .map(str::to_owned)
                .filter(|l| !l.trim().is_empty())
                .collect();

            // `get_text` exposes no per-line confidence; report a fixed
            // engine-level estimate.
            Ok(RecognizedText {
                lines,
                confidence: 0.9,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_mrz_shaped_lines() {
        let lines = vec![
            "PASSPORT".to_string(),
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<".to_string(),
            "L898902C<3UTO6908061F9406236ZE184226B<<<<<10".to_string(),
            "Republic of Utopia, Ministry of the Interior and Foreign Affairs".to_string(),
        ];
        let survivors = filter_mrz_lines(&lines);
        assert_eq!(survivors.len(), 2);
        assert!(survivors[0].starts_with("P<UTO"));
    }

    #[test]
    fn filter_normalizes_misread_fillers_and_case() {
        let lines = vec!["p«utoeriksson««anna«maria««««««««««««««««««(".to_string()];
        let survivors = filter_mrz_lines(&lines);
        assert_eq!(
            survivors,
            vec!["P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<".to_string()]
        );
    }

    #[test]
    fn filter_keeps_digit_runs_without_fillers() {
        // A line whose fillers were all dropped by the engine still survives
        // on the strength of its date digit runs.
        let lines = vec!["L898902C3UTO6908061F9406236ZE184226B10".to_string()];
        assert_eq!(filter_mrz_lines(&lines).len(), 1);
    }

    #[test]
    fn filter_drops_short_and_long_lines() {
        let lines = vec![
            "<<<".to_string(),
            "<".repeat(80),
        ];
        assert!(filter_mrz_lines(&lines).is_empty());
    }

    #[test]
    fn scripted_recognizer_replays_lines() {
        let rec = ScriptedRecognizer::new(vec!["A<B".to_string()], 0.5);
        let img = DynamicImage::new_rgb8(4, 4);
        let out = rec.recognize(&img).unwrap();
        assert_eq!(out.lines, vec!["A<B".to_string()]);
        assert!((out.confidence - 0.5).abs() < f32::EPSILON);
    }
}
