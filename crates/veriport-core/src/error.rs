// SPDX-License-Identifier: Apache-2.0
//
// Unified error types for Veriport.

use thiserror::Error;

/// Top-level error type for all Veriport operations.
#[derive(Debug, Error)]
pub enum VeriportError {
    // -- Camera / capture errors --
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available: {0}")]
    DeviceUnavailable(String),

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    // -- Recognition errors --
    #[error("recognition timed out after {0} seconds")]
    RecognitionTimeout(u64),

    #[error("recognition engine failed: {0}")]
    RecognitionFailed(String),

    #[error("MRZ decode incomplete: {0}")]
    DecodeIncomplete(String),

    // -- Authentication errors --
    #[error("document validation failed: {0}")]
    DocumentInvalid(String),

    #[error("document appears to be a photo of a screen")]
    SpoofSuspected,

    #[error("face match score {score:.2} below threshold {threshold:.2}")]
    MatchBelowThreshold { score: f32, threshold: f32 },

    // -- Pairing errors --
    #[error("pairing session invalid: {0}")]
    SessionInvalid(String),

    #[error("paired device unreachable after {0} attempts")]
    PairingTimeout(u32),

    // -- Ambient --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VeriportError>;

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// Timeout, blurry capture, low confidence — safe to retry the stage.
    Transient,
    /// User must take action (grant permission, free the camera, use a real document).
    UserAction,
    /// Cannot be fixed by retrying this stage.
    Permanent,
}
