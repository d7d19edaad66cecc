// SPDX-License-Identifier: Apache-2.0
//
// Veriport — Capture flow: the stage state machine, retry classification,
// the async pipeline driver, and the claims/proof boundary.

pub mod machine;
pub mod pipeline;
pub mod proof;
pub mod retry;

pub use machine::{CaptureMachine, CaptureStage, Effect, FlowEvent, Transition};
pub use pipeline::{AttemptContext, StagePipeline};
pub use proof::{
    claims_from_fields, derive_clauses, ProofArtifact, ProofBackend, SimulatedLedger,
    SimulatedProver, SubmissionReceipt, Submitter,
};
pub use retry::{classify_error, should_retry, RetryConfig, RetryDecision};
