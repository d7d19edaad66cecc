// SPDX-License-Identifier: Apache-2.0
//
// Pipeline configuration. Every threshold, timeout, and policy knob the
// pipeline consults lives here under one name — no duplicated literals in
// stage code.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the verification pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub matching: MatchConfig,
    pub validation: ValidationPolicy,
    pub timeouts: TimeoutConfig,
    pub regions: RegionConfig,
    pub mrz: MrzPolicy,
    pub pairing: PairingConfig,
}

/// Face matching thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Minimum similarity score for a face match to be accepted.
    pub face_match_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            face_match_threshold: 0.70,
        }
    }
}

/// Document acceptance policy for the validation aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// When true, a document that passes anti-spoofing is accepted even if
    /// required MRZ elements are missing; undetected fields are filled with
    /// placeholder values and the checklist shows what was actually read.
    /// When false, validity additionally requires a detected MRZ and photo.
    pub accept_incomplete_document: bool,
    /// Floor applied to the confidence of any detected element, so a
    /// detected element never reports a contradictory near-zero confidence.
    pub detected_confidence_floor: f32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            accept_incomplete_document: true,
            detected_confidence_floor: 0.85,
        }
    }
}

/// Per-stage timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Document validation (preprocessing + OCR + decode) budget, seconds.
    pub validation_secs: u64,
    /// Overall capture-stage budget, seconds.
    pub capture_secs: u64,
}

impl TimeoutConfig {
    pub fn validation(&self) -> Duration {
        Duration::from_secs(self.validation_secs)
    }

    pub fn capture(&self) -> Duration {
        Duration::from_secs(self.capture_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            validation_secs: 45,
            capture_secs: 60,
        }
    }
}

/// Document geometry assumptions for region segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Fraction of the frame height (from the top) treated as the photo region.
    pub photo_fraction: f32,
    /// Fraction of the frame height (from the bottom) treated as the MRZ region.
    pub mrz_fraction: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            photo_fraction: 0.40,
            mrz_fraction: 0.30,
        }
    }
}

/// Century-inference policy for two-digit MRZ years.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrzPolicy {
    /// Birth years at or above this two-digit value resolve to the 1900s;
    /// below it, to the 2000s.
    pub dob_century_pivot: u8,
    /// Expiry dates resolve to whichever century places them no more than
    /// this many years into the future.
    pub expiry_horizon_years: i32,
}

impl Default for MrzPolicy {
    fn default() -> Self {
        Self {
            dob_century_pivot: 50,
            expiry_horizon_years: 50,
        }
    }
}

/// Cross-device pairing channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Interval between repeated `connected` announcements, milliseconds.
    pub announce_interval_ms: u64,
    /// Announcement attempts before the primary is declared unreachable.
    pub max_announce_attempts: u32,
    /// Consumer-side polling interval, milliseconds.
    pub poll_interval_ms: u64,
}

impl PairingConfig {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            announce_interval_ms: 500,
            max_announce_attempts: 100,
            poll_interval_ms: 500,
        }
    }
}
