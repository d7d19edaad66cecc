// SPDX-License-Identifier: Apache-2.0
//
// Face presence detection and portrait matching.

pub mod detect;
pub mod matcher;

pub use detect::{detect_face, FaceDetection};
pub use matcher::{FaceEmbedding, FaceEncoder, FaceMatcher, GridEncoder};
