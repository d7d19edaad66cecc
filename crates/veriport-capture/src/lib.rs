// SPDX-License-Identifier: Apache-2.0
//
// Veriport — Camera adapter boundary.
//
// The pipeline never talks to camera hardware directly; it drives a
// `FrameSource`. Native implementations (desktop webcam, mobile camera) live
// behind this trait, and the doubles in this crate stand in for them in
// tests and headless builds.

pub mod doubles;
pub mod stub;
pub mod traits;

pub use doubles::{RecordingCamera, StaticCamera};
pub use stub::StubCamera;
pub use traits::{CameraConstraints, FacingMode, FrameSource};
