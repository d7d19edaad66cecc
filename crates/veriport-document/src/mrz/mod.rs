// SPDX-License-Identifier: Apache-2.0
//
// Machine-readable zone handling: OCR adapter and field decoding.

pub mod decode;
pub mod ocr;

pub use decode::{check_digit, decode_td1, decode_td3, resolve_dob_year, resolve_expiry_year};
pub use ocr::{filter_mrz_lines, RecognizedText, ScriptedRecognizer, TextRecognizer, MRZ_CHARSET};

#[cfg(feature = "ocr")]
pub use ocr::{MrzOcrConfig, OcrsRecognizer};
