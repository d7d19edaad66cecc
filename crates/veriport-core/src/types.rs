// SPDX-License-Identifier: Apache-2.0
//
// Core domain types for the Veriport verification pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a pairing/capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A still frame captured from a camera.
///
/// The buffer is tightly packed RGBA, row-major, 4 bytes per pixel. A frame
/// is immutable once produced and owned exclusively by the stage that
/// produced it until handed to the next stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA samples, length = width * height * 4.
    pub rgba: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl RawFrame {
    /// Construct a frame, verifying the buffer length matches the geometry.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if rgba.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
            captured_at: Utc::now(),
        })
    }

    /// A frame filled with a single RGBA color (tests and fixtures).
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            rgba.extend_from_slice(&pixel);
        }
        Self {
            width,
            height,
            rgba,
            captured_at: Utc::now(),
        }
    }

    /// RGBA sample at (x, y). Panics if out of bounds — callers iterate
    /// within `width`/`height`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.rgba[idx],
            self.rgba[idx + 1],
            self.rgba[idx + 2],
            self.rgba[idx + 3],
        ]
    }
}

/// Sex as recorded in the MRZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
    /// `<` or `X` in the MRZ.
    Unspecified,
}

impl Sex {
    pub fn from_mrz_char(c: char) -> Self {
        match c {
            'F' => Self::Female,
            'M' => Self::Male,
            _ => Self::Unspecified,
        }
    }

    pub fn as_mrz_char(&self) -> char {
        match self {
            Self::Female => 'F',
            Self::Male => 'M',
            Self::Unspecified => '<',
        }
    }
}

/// Structured fields decoded from a passport MRZ.
///
/// Produced only by the MRZ decoder. Every populated field has passed its
/// checksum or structural check, or appears in [`MrzDecode::unverified`]
/// (fields are retained but flagged rather than discarded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFields {
    /// Document type letter(s), e.g. "P" for passport.
    pub document_type: String,
    /// Three-letter issuing state code.
    pub issuing_country: String,
    /// Surname and given names, filler characters collapsed to spaces.
    pub name: String,
    /// Document number with fillers stripped.
    pub document_number: String,
    /// Three-letter nationality code.
    pub nationality: String,
    /// Date of birth as YYMMDD.
    pub date_of_birth: String,
    pub sex: Sex,
    /// Date of expiry as YYMMDD.
    pub date_of_expiry: String,
    /// Optional personal number / optional data field.
    pub personal_number: Option<String>,
}

/// The individual MRZ fields that carry their own check digit or structural
/// rule. Used to flag partial-decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MrzField {
    DocumentNumber,
    DateOfBirth,
    DateOfExpiry,
    PersonalNumber,
    Composite,
}

impl std::fmt::Display for MrzField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DocumentNumber => "document number",
            Self::DateOfBirth => "date of birth",
            Self::DateOfExpiry => "date of expiry",
            Self::PersonalNumber => "personal number",
            Self::Composite => "composite",
        };
        f.write_str(s)
    }
}

/// Result of decoding an MRZ block: the fields plus which ones failed
/// their check digit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrzDecode {
    pub fields: DocumentFields,
    /// Fields whose check digit did not verify. Values are retained.
    pub unverified: Vec<MrzField>,
    /// Human-readable decode problems (for the UI checklist).
    pub errors: Vec<String>,
}

impl MrzDecode {
    /// True when every checked field verified.
    pub fn fully_verified(&self) -> bool {
        self.unverified.is_empty()
    }
}

/// The required elements a capture attempt is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKey {
    Mrz,
    PassportNumber,
    DocumentType,
    Country,
    Name,
    Dob,
    Expiry,
    Photo,
}

impl ElementKey {
    /// All element keys, in checklist order.
    pub const ALL: [ElementKey; 8] = [
        ElementKey::Mrz,
        ElementKey::PassportNumber,
        ElementKey::DocumentType,
        ElementKey::Country,
        ElementKey::Name,
        ElementKey::Dob,
        ElementKey::Expiry,
        ElementKey::Photo,
    ];
}

/// Detection status of a single required element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementStatus {
    pub detected: bool,
    /// Clamped to [0, 1]; when `detected` is true, floor-clamped to the
    /// configured detected-confidence band so detected=true never coexists
    /// with a near-zero confidence.
    pub confidence: f32,
    pub value: Option<String>,
}

impl ElementStatus {
    pub fn detected(confidence: f32, value: impl Into<Option<String>>) -> Self {
        Self {
            detected: true,
            confidence,
            value: value.into(),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

/// Aggregated validation of one capture attempt.
///
/// Created fresh per attempt and never mutated across attempts — a retry
/// builds a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportValidation {
    pub is_valid: bool,
    /// False when the anti-spoofing detector flagged a screen replay.
    pub is_real_document: bool,
    pub elements: BTreeMap<ElementKey, ElementStatus>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl PassportValidation {
    /// A fresh validation with every element undetected.
    pub fn empty() -> Self {
        let elements = ElementKey::ALL
            .iter()
            .map(|k| (*k, ElementStatus::missing()))
            .collect();
        Self {
            is_valid: false,
            is_real_document: true,
            elements,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn element(&self, key: ElementKey) -> ElementStatus {
        self.elements
            .get(&key)
            .cloned()
            .unwrap_or_else(ElementStatus::missing)
    }

    pub fn detected_count(&self) -> usize {
        self.elements.values().filter(|e| e.detected).count()
    }
}

/// Similarity between the document photo and a live face capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatchResult {
    /// Similarity score in [0, 1].
    pub score: f32,
}

impl FaceMatchResult {
    pub fn accepted(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// Read-only projection of verified document and biometric data — the
/// input to proof generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub date_of_expiry: NaiveDate,
    pub country_code: String,
    pub face_match_score: f32,
}
