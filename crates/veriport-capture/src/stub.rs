// SPDX-License-Identifier: Apache-2.0
//
// Stub camera for headless/CI builds where no capture device exists.
// Real implementations live in platform integration crates.

use veriport_core::error::{Result, VeriportError};
use veriport_core::types::RawFrame;

use crate::traits::{CameraConstraints, FrameSource};

/// No-op camera returned on platforms without capture support.
#[derive(Debug, Default)]
pub struct StubCamera;

impl FrameSource for StubCamera {
    fn open(&mut self, _constraints: &CameraConstraints) -> Result<()> {
        tracing::warn!("FrameSource::open called on stub camera");
        Err(VeriportError::DeviceUnavailable(
            "no capture device on this platform".into(),
        ))
    }

    fn grab_frame(&mut self) -> Result<RawFrame> {
        Err(VeriportError::CaptureFailed("stub camera".into()))
    }

    fn release(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_device_unavailable() {
        let mut cam = StubCamera;
        let err = cam.open(&CameraConstraints::document()).unwrap_err();
        assert!(matches!(err, VeriportError::DeviceUnavailable(_)));
        assert!(!cam.is_active());
    }
}
