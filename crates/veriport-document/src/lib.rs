// SPDX-License-Identifier: Apache-2.0
//
// Veriport — Document analysis: region segmentation, anti-spoofing
// heuristics, MRZ recognition and decoding, face detection and matching,
// and the validation aggregator that combines them.

pub mod antispoof;
pub mod face;
pub mod mrz;
pub mod regions;
pub mod validate;

pub use antispoof::{SpoofReport, SpoofThresholds, detect_screen_replay};
pub use regions::{DocumentRegions, RegionPreprocessor};
pub use validate::PassportValidator;
