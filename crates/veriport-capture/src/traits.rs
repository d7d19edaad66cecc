// SPDX-License-Identifier: Apache-2.0
//
// Camera adapter trait. One `FrameSource` is active per pipeline stage; the
// previous stage must release it before the next stage may open it.

use serde::{Deserialize, Serialize};
use veriport_core::error::Result;
use veriport_core::types::RawFrame;

/// Which camera to prefer on devices that have more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    /// Front camera — used for live face capture.
    User,
    /// Rear camera — used for document capture.
    Environment,
}

/// Constraints passed when opening a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl CameraConstraints {
    /// Rear camera at the resolution the document pipeline is tuned for.
    pub fn document() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }

    /// Front camera for live face capture.
    pub fn face() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// A source of still frames with an explicit open/release lifecycle.
///
/// Errors map to the capture taxonomy: `PermissionDenied`,
/// `DeviceUnavailable`, `DeviceBusy` from `open`; `CaptureFailed` from
/// `grab_frame`.
///
/// Implementations must make `release` idempotent — the flow calls it on
/// every exit path (stage transition, retry, cancellation), sometimes more
/// than once.
pub trait FrameSource {
    /// Acquire the camera. Fails if permission is denied, no device exists,
    /// or another process holds the device.
    fn open(&mut self, constraints: &CameraConstraints) -> Result<()>;

    /// Capture one still frame. The source must be open.
    fn grab_frame(&mut self) -> Result<RawFrame>;

    /// Stop all media tracks and free the device. Idempotent.
    fn release(&mut self);

    /// Whether the device is currently held.
    fn is_active(&self) -> bool;
}
