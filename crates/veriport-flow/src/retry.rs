// SPDX-License-Identifier: Apache-2.0
//
// Retry engine with exponential backoff for transient stage failures.
//
// Classifies errors into Transient (auto-retry), UserAction (wait for the
// user), and Permanent (give up). Only transient errors trigger automatic
// retries.

use std::time::Duration;

use tracing::{debug, info, warn};
use veriport_core::error::{ErrorClass, VeriportError};

/// Retry configuration.
pub struct RetryConfig {
    /// Maximum number of automatic retry attempts per stage.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Result of evaluating whether to retry.
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry — error is permanent or user action needed.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a [`VeriportError`] for retry decisions.
pub fn classify_error(err: &VeriportError) -> ErrorClass {
    match err {
        // Transient — blur, timeout, a bad single frame
        VeriportError::RecognitionTimeout(_) => ErrorClass::Transient,
        VeriportError::RecognitionFailed(_) => ErrorClass::Transient,
        VeriportError::DecodeIncomplete(_) => ErrorClass::Transient,
        VeriportError::DocumentInvalid(_) => ErrorClass::Transient,
        VeriportError::CaptureFailed(_) => ErrorClass::Transient,
        VeriportError::Image(_) => ErrorClass::Transient,

        // User action needed
        VeriportError::PermissionDenied => ErrorClass::UserAction,
        VeriportError::DeviceBusy => ErrorClass::UserAction,
        VeriportError::SpoofSuspected => ErrorClass::UserAction,
        VeriportError::MatchBelowThreshold { .. } => ErrorClass::UserAction,

        // The announce loop already exhausted its budget; only the user
        // re-scanning the pairing code can help.
        VeriportError::PairingTimeout(_) => ErrorClass::UserAction,

        // Permanent — retrying the stage cannot help
        VeriportError::DeviceUnavailable(_) => ErrorClass::Permanent,
        VeriportError::SessionInvalid(_) => ErrorClass::Permanent,
        VeriportError::Serialization(_) => ErrorClass::Permanent,

        // IO errors depend on the kind
        VeriportError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Transient,
        },
    }
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &VeriportError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    let class = classify_error(err);

    match class {
        ErrorClass::Permanent => {
            info!(%err, "permanent error — not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!(%err, "user action required — not auto-retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Exponential backoff with deterministic jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));

    let jitter_ms = jitter(base_ms, attempt);
    let total_ms = exp_ms.saturating_add(jitter_ms);
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}

/// Spread retries without a random source: hash the attempt number into
/// [0, base).
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
