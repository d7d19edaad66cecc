// SPDX-License-Identifier: Apache-2.0
//
// Camera test doubles.
//
// `StaticCamera` serves preloaded frames in order; `RecordingCamera` wraps
// any source and counts lifecycle calls so tests can assert that no media
// track outlives its stage.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use veriport_core::error::{Result, VeriportError};
use veriport_core::types::RawFrame;

use crate::traits::{CameraConstraints, FrameSource};

/// Serves a fixed queue of frames. Grabbing past the end is a
/// `CaptureFailed`, mirroring a camera that produced no image.
#[derive(Debug)]
pub struct StaticCamera {
    frames: VecDeque<RawFrame>,
    active: bool,
}

impl StaticCamera {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            active: false,
        }
    }
}

impl FrameSource for StaticCamera {
    fn open(&mut self, _constraints: &CameraConstraints) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<RawFrame> {
        if !self.active {
            return Err(VeriportError::CaptureFailed("camera not open".into()));
        }
        self.frames
            .pop_front()
            .ok_or_else(|| VeriportError::CaptureFailed("no frame available".into()))
    }

    fn release(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Shared counters observed by tests after the flow finishes.
#[derive(Debug, Default)]
pub struct CameraLog {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CameraLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Wraps another source and records every open/release call.
pub struct RecordingCamera<S: FrameSource> {
    inner: S,
    log: Arc<CameraLog>,
}

impl<S: FrameSource> RecordingCamera<S> {
    pub fn new(inner: S) -> (Self, Arc<CameraLog>) {
        let log = Arc::new(CameraLog::default());
        (
            Self {
                inner,
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl<S: FrameSource> FrameSource for RecordingCamera<S> {
    fn open(&mut self, constraints: &CameraConstraints) -> Result<()> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(constraints)
    }

    fn grab_frame(&mut self) -> Result<RawFrame> {
        self.inner.grab_frame()
    }

    fn release(&mut self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}
