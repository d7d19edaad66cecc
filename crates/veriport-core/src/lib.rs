// SPDX-License-Identifier: Apache-2.0
//
// Veriport — Core types, errors, and configuration shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::PipelineConfig;
pub use error::VeriportError;
pub use types::*;
