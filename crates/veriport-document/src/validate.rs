// SPDX-License-Identifier: Apache-2.0
//
// Validation aggregator — combines anti-spoofing, MRZ decoding and the
// photo-region face check into one per-attempt verdict.
//
// The aggregator is deliberately lenient by default: a document whose MRZ
// could not be read still validates as long as the anti-spoofing check
// passed, with placeholder values standing in for the unread fields. This
// mirrors field conditions where glare or motion blur routinely defeats OCR
// on genuine documents. The strict mode (policy flag off) demands a decoded
// MRZ and a visible portrait.

use image::DynamicImage;
use tracing::{debug, info, instrument, warn};
use veriport_core::config::{RegionConfig, ValidationPolicy};
use veriport_core::error::Result;
use veriport_core::types::{
    ElementKey, ElementStatus, MrzDecode, PassportValidation, RawFrame,
};

use crate::antispoof::{detect_screen_replay, SpoofReport, SpoofThresholds};
use crate::face::detect::detect_face;
use crate::mrz::decode::{decode_td1, decode_td3};
use crate::mrz::ocr::{filter_mrz_lines, TextRecognizer};
use crate::regions::RegionPreprocessor;

/// Placeholder values recorded when the MRZ is unreadable but the policy
/// accepts incomplete documents.
const PLACEHOLDER_NAME: &str = "UNKNOWN";
const PLACEHOLDER_COUNTRY: &str = "XXX";
const PLACEHOLDER_NUMBER: &str = "000000";

/// Everything one validation pass produces: the element verdict, the decoded
/// MRZ when available, the replay report, and the portrait crop for the
/// downstream face-matching stage.
pub struct ValidationOutcome {
    pub validation: PassportValidation,
    pub decode: Option<MrzDecode>,
    pub spoof: SpoofReport,
    /// Portrait region crop, kept for face matching.
    pub photo_region: DynamicImage,
}

/// Runs the full document-frame validation pass.
pub struct PassportValidator {
    policy: ValidationPolicy,
    spoof_thresholds: SpoofThresholds,
    preprocessor: RegionPreprocessor,
    recognizer: Box<dyn TextRecognizer>,
}

impl PassportValidator {
    pub fn new(
        policy: ValidationPolicy,
        regions: RegionConfig,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Self {
        Self {
            policy,
            spoof_thresholds: SpoofThresholds::default(),
            preprocessor: RegionPreprocessor::new(regions),
            recognizer,
        }
    }

    pub fn with_spoof_thresholds(mut self, thresholds: SpoofThresholds) -> Self {
        self.spoof_thresholds = thresholds;
        self
    }

    /// Validate a captured document frame.
    ///
    /// Never fails on OCR or decode problems — those degrade into warnings
    /// or placeholder elements per the policy. Only frame-level problems
    /// (malformed buffer) surface as errors.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn validate_frame(&self, frame: &RawFrame) -> Result<ValidationOutcome> {
        let spoof = detect_screen_replay(frame, &self.spoof_thresholds);
        let regions = self.preprocessor.segment(frame)?;

        let mut validation = PassportValidation::empty();
        validation.is_real_document = !spoof.is_screen_replay;
        if spoof.is_screen_replay {
            warn!(indicators = spoof.indicators, "screen replay suspected");
            validation
                .errors
                .push("document appears to be displayed on a screen".to_string());
        }

        // MRZ recognition and decode, both downgraded to warnings on failure.
        let decode = match self.recognizer.recognize(&regions.mrz) {
            Ok(recognized) => {
                let candidates = filter_mrz_lines(&recognized.lines);
                match decode_candidates(&candidates) {
                    Ok(decode) => {
                        self.fill_mrz_elements(&mut validation, &decode, recognized.confidence);
                        Some(decode)
                    }
                    Err(err) => {
                        debug!(%err, "MRZ decode failed");
                        validation.warnings.push(format!("MRZ not decodable: {err}"));
                        None
                    }
                }
            }
            Err(err) => {
                debug!(%err, "MRZ recognition failed");
                validation.warnings.push(format!("MRZ not readable: {err}"));
                None
            }
        };

        if decode.is_none() && self.policy.accept_incomplete_document {
            self.fill_placeholders(&mut validation);
        }

        // Portrait presence.
        let face = detect_face(&regions.photo);
        if face.detected {
            validation
                .elements
                .insert(ElementKey::Photo, ElementStatus::detected(face.confidence, None));
        } else {
            validation
                .warnings
                .push("no portrait detected in photo region".to_string());
        }

        self.normalize(&mut validation);
        validation.is_valid = self.judge(&validation, decode.as_ref());

        info!(
            is_valid = validation.is_valid,
            is_real = validation.is_real_document,
            detected = validation.detected_count(),
            warnings = validation.warnings.len(),
            "validation pass complete"
        );

        Ok(ValidationOutcome {
            validation,
            decode,
            spoof,
            photo_region: regions.photo,
        })
    }

    fn fill_mrz_elements(
        &self,
        validation: &mut PassportValidation,
        decode: &MrzDecode,
        confidence: f32,
    ) {
        let fields = &decode.fields;
        let set = |v: &mut PassportValidation, key: ElementKey, value: String| {
            v.elements
                .insert(key, ElementStatus::detected(confidence, Some(value)));
        };

        set(validation, ElementKey::Mrz, String::new());
        set(validation, ElementKey::PassportNumber, fields.document_number.clone());
        set(validation, ElementKey::DocumentType, fields.document_type.clone());
        set(validation, ElementKey::Country, fields.issuing_country.clone());
        set(validation, ElementKey::Name, fields.name.clone());
        set(validation, ElementKey::Dob, fields.date_of_birth.clone());
        set(validation, ElementKey::Expiry, fields.date_of_expiry.clone());

        for field in &decode.unverified {
            validation
                .warnings
                .push(format!("{field} failed its check digit"));
        }
    }

    /// Lenient fallback: stand-in values for the identity elements so the
    /// attempt can proceed, each flagged in the warning list.
    fn fill_placeholders(&self, validation: &mut PassportValidation) {
        let floor = self.policy.detected_confidence_floor;
        let placeholders = [
            (ElementKey::Name, PLACEHOLDER_NAME),
            (ElementKey::Country, PLACEHOLDER_COUNTRY),
            (ElementKey::PassportNumber, PLACEHOLDER_NUMBER),
        ];
        for (key, value) in placeholders {
            validation
                .elements
                .insert(key, ElementStatus::detected(floor, Some(value.to_string())));
        }
        validation
            .warnings
            .push("identity fields replaced with placeholders".to_string());
    }

    /// Enforce the element-status invariants: confidence clamped to [0, 1],
    /// a present value forces detection, and detected elements never carry a
    /// confidence below the configured floor.
    fn normalize(&self, validation: &mut PassportValidation) {
        let floor = self.policy.detected_confidence_floor;
        for status in validation.elements.values_mut() {
            status.confidence = status.confidence.clamp(0.0, 1.0);
            if status.value.is_some() {
                status.detected = true;
            }
            if status.detected {
                status.confidence = status.confidence.max(floor);
            }
        }
    }

    fn judge(&self, validation: &PassportValidation, decode: Option<&MrzDecode>) -> bool {
        if self.policy.accept_incomplete_document {
            validation.is_real_document
        } else {
            validation.is_real_document
                && decode.is_some()
                && validation.element(ElementKey::Photo).detected
        }
    }
}

/// Try the TD3 passport layout first, then fall back to the TD1 card layout
/// when three 30-character lines survived filtering.
fn decode_candidates(candidates: &[String]) -> Result<MrzDecode> {
    match decode_td3(candidates) {
        Ok(decode) => Ok(decode),
        Err(td3_err) => {
            let tail_is_td1 = candidates.len() >= 3
                && candidates[candidates.len() - 3..].iter().all(|l| l.len() == 30);
            if tail_is_td1 {
                decode_td1(candidates)
            } else {
                Err(td3_err)
            }
        }
    }
}
