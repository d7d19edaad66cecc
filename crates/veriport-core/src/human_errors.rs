// SPDX-License-Identifier: Apache-2.0
//
// Human-readable error messages for the verification UI.
//
// Every pipeline error maps to plain English plus a concrete suggestion.
// The severity drives whether the flow auto-retries, waits for the user,
// or gives up on the current sub-flow.

use crate::error::{ErrorClass, VeriportError};

/// A human-readable error with a plain summary and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the flow may retry the stage automatically.
    pub retriable: bool,
    /// Classification that drives retry/guidance behavior.
    pub class: ErrorClass,
}

/// Convert a `VeriportError` into guidance a non-technical user can follow.
pub fn humanize_error(err: &VeriportError) -> HumanError {
    match err {
        VeriportError::PermissionDenied => HumanError {
            message: "Camera access was denied.".into(),
            suggestion: "Enable camera permissions for this app in your system or browser \
                         settings, then try again."
                .into(),
            retriable: false,
            class: ErrorClass::UserAction,
        },

        VeriportError::DeviceUnavailable(_) => HumanError {
            message: "No camera was found.".into(),
            suggestion: "Make sure your device has a working camera, or use your phone to \
                         capture instead."
                .into(),
            retriable: false,
            class: ErrorClass::UserAction,
        },

        VeriportError::DeviceBusy => HumanError {
            message: "The camera is busy.".into(),
            suggestion: "Another application is using the camera. Close it and try again.".into(),
            retriable: false,
            class: ErrorClass::UserAction,
        },

        VeriportError::CaptureFailed(_) => HumanError {
            message: "We couldn't capture an image.".into(),
            suggestion: "Hold the document steady and press capture again.".into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::RecognitionTimeout(secs) => HumanError {
            message: "Processing is taking longer than expected.".into(),
            suggestion: format!(
                "Reading the document took more than {secs} seconds. Check the lighting \
                 and try again."
            ),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::RecognitionFailed(_) => HumanError {
            message: "We couldn't read the document.".into(),
            suggestion: "Make sure the whole passport page is visible, flat, and well lit, \
                         then capture again."
                .into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::DecodeIncomplete(_) => HumanError {
            message: "Some passport details couldn't be read.".into(),
            suggestion: "Check the detection list below, make sure the two lines at the \
                         bottom of the passport are visible, and retake the photo."
                .into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::DocumentInvalid(_) => HumanError {
            message: "The document couldn't be fully verified.".into(),
            suggestion: "Make sure the whole photo page fills the frame, with the portrait \
                         and both machine-readable lines visible, then capture again."
                .into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::SpoofSuspected => HumanError {
            message: "This looks like a photo of a screen.".into(),
            suggestion: "Please capture the physical passport document, not a picture of it \
                         on another screen."
                .into(),
            retriable: true,
            class: ErrorClass::UserAction,
        },

        VeriportError::MatchBelowThreshold { .. } => HumanError {
            message: "Your face didn't match the passport photo well enough.".into(),
            suggestion: "Look straight at the camera in good light, remove glasses or hats, \
                         and try again."
                .into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::SessionInvalid(_) => HumanError {
            message: "The phone pairing link isn't valid.".into(),
            suggestion: "Scan the QR code again from this screen, or continue with the \
                         local camera instead."
                .into(),
            retriable: false,
            class: ErrorClass::Permanent,
        },

        VeriportError::PairingTimeout(_) => HumanError {
            message: "We couldn't reach the other device.".into(),
            suggestion: "Make sure both devices are online and on the same address, then \
                         scan the QR code again."
                .into(),
            retriable: false,
            class: ErrorClass::UserAction,
        },

        VeriportError::Image(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The captured frame couldn't be processed. Capture again.".into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::Io(_) => HumanError {
            message: "A file operation failed.".into(),
            suggestion: "Check disk space and permissions, then try again.".into(),
            retriable: true,
            class: ErrorClass::Transient,
        },

        VeriportError::Serialization(_) => HumanError {
            message: "Data couldn't be encoded.".into(),
            suggestion: "This is an internal problem — please restart the verification.".into(),
            retriable: false,
            class: ErrorClass::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_requires_user_action() {
        let h = humanize_error(&VeriportError::PermissionDenied);
        assert_eq!(h.class, ErrorClass::UserAction);
        assert!(!h.retriable);
        assert!(h.suggestion.to_lowercase().contains("permission"));
    }

    #[test]
    fn timeout_is_retriable() {
        let h = humanize_error(&VeriportError::RecognitionTimeout(45));
        assert_eq!(h.class, ErrorClass::Transient);
        assert!(h.retriable);
        assert!(h.suggestion.contains("45"));
    }

    #[test]
    fn session_invalid_is_terminal_for_pairing() {
        let h = humanize_error(&VeriportError::SessionInvalid("missing token".into()));
        assert_eq!(h.class, ErrorClass::Permanent);
        // The suggestion must point at the local-capture fallback.
        assert!(h.suggestion.contains("local camera"));
    }
}
