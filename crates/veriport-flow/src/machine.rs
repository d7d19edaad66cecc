// SPDX-License-Identifier: Apache-2.0
//
// Capture flow state machine.
//
// Stages advance strictly forward except for the match-failure loop back to
// face capture. The machine never performs side effects itself: each
// transition carries effect descriptors (release the camera, clear cached
// frames, stop polling) that the driver executes, so the whole flow is
// testable without a camera or a runtime.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// The stages of a verification session, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStage {
    /// Capturing and validating the document page.
    Document,
    /// Capturing the live face.
    Face,
    /// Scoring the live face against the document portrait.
    Matching,
    /// User reviews the extracted identity summary.
    Summary,
    /// Generating the proof artifact.
    Proof,
    /// Submitting the proof.
    Transaction,
    /// Terminal success.
    Complete,
    /// Terminal abort.
    Cancelled,
}

impl CaptureStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

/// Events the driver feeds into the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Document frame validated (possibly leniently).
    DocumentValidated,
    /// Live face frame captured.
    FaceCaptured,
    /// Face match scored; the machine applies the threshold.
    MatchScored { score: f32 },
    /// User confirmed the extracted summary.
    SummaryConfirmed,
    /// Proof artifact generated.
    ProofGenerated,
    /// Proof submitted and acknowledged.
    TransactionSubmitted,
    /// Re-enter the current stage after a transient failure; per-attempt
    /// data is cleared, session identity is preserved.
    RetryStage,
    /// User abort, valid from any non-terminal stage.
    Cancel,
}

/// Side effects the driver must execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Close the active camera stream.
    ReleaseCamera,
    /// Discard the cached live-face frame.
    ClearFaceFrame,
    /// Discard all captured document images.
    ClearCapturedImages,
    /// Stop polling the pairing channel.
    StopPolling,
}

/// The outcome of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: CaptureStage,
    pub effects: Vec<Effect>,
    /// Set when the event was rejected or represents a failure the user
    /// should see (e.g. a match below threshold).
    pub error: Option<String>,
}

impl Transition {
    fn advance(next: CaptureStage, effects: Vec<Effect>) -> Self {
        Self {
            next,
            effects,
            error: None,
        }
    }

    fn rejected(stage: CaptureStage, event: &FlowEvent) -> Self {
        Self {
            next: stage,
            effects: Vec::new(),
            error: Some(format!("event {event:?} not valid in stage {stage:?}")),
        }
    }
}

/// Drives a single verification session through its stages.
#[derive(Debug, Clone)]
pub struct CaptureMachine {
    stage: CaptureStage,
    face_match_threshold: f32,
}

impl CaptureMachine {
    pub fn new(face_match_threshold: f32) -> Self {
        Self {
            stage: CaptureStage::Document,
            face_match_threshold,
        }
    }

    pub fn stage(&self) -> CaptureStage {
        self.stage
    }

    /// Apply an event, returning the transition taken.
    ///
    /// Invalid events leave the stage unchanged and set
    /// [`Transition::error`]. Terminal stages reject everything.
    pub fn transition(&mut self, event: FlowEvent) -> Transition {
        let from = self.stage;
        let transition = self.evaluate(&event);
        self.stage = transition.next;

        if let Some(err) = &transition.error {
            warn!(?from, ?event, next = ?transition.next, %err, "flow transition rejected or failed");
        } else if from != transition.next {
            info!(?from, next = ?transition.next, effects = ?transition.effects, "flow stage advanced");
        } else {
            debug!(?from, ?event, "flow stage re-entered");
        }
        transition
    }

    fn evaluate(&self, event: &FlowEvent) -> Transition {
        use CaptureStage::*;

        if self.stage.is_terminal() {
            return Transition::rejected(self.stage, event);
        }

        match (self.stage, event) {
            // Cancellation wins over everything else.
            (_, FlowEvent::Cancel) => Transition::advance(
                Cancelled,
                vec![
                    Effect::ReleaseCamera,
                    Effect::ClearFaceFrame,
                    Effect::ClearCapturedImages,
                    Effect::StopPolling,
                ],
            ),

            // Retry re-enters the current stage, clearing its attempt data.
            (Document, FlowEvent::RetryStage) => {
                Transition::advance(Document, vec![Effect::ClearCapturedImages])
            }
            (Face, FlowEvent::RetryStage) => {
                Transition::advance(Face, vec![Effect::ClearFaceFrame])
            }

            (Document, FlowEvent::DocumentValidated) => {
                // Document camera closes before the face stage opens its own.
                Transition::advance(Face, vec![Effect::ReleaseCamera])
            }
            (Face, FlowEvent::FaceCaptured) => {
                Transition::advance(Matching, vec![Effect::ReleaseCamera])
            }
            (Matching, FlowEvent::MatchScored { score }) => {
                if *score >= self.face_match_threshold {
                    Transition::advance(Summary, Vec::new())
                } else {
                    // Back to face capture; the document capture survives.
                    Transition {
                        next: Face,
                        effects: vec![Effect::ClearFaceFrame],
                        error: Some(format!(
                            "face match score {score:.2} below threshold {:.2}",
                            self.face_match_threshold
                        )),
                    }
                }
            }
            (Summary, FlowEvent::SummaryConfirmed) => Transition::advance(Proof, Vec::new()),
            (Proof, FlowEvent::ProofGenerated) => Transition::advance(Transaction, Vec::new()),
            (Transaction, FlowEvent::TransactionSubmitted) => {
                Transition::advance(Complete, vec![Effect::StopPolling])
            }

            (stage, event) => Transition::rejected(stage, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> CaptureMachine {
        CaptureMachine::new(0.70)
    }

    #[test]
    fn happy_path_reaches_complete() {
        let mut m = machine();
        assert_eq!(m.stage(), CaptureStage::Document);

        let t = m.transition(FlowEvent::DocumentValidated);
        assert_eq!(t.next, CaptureStage::Face);
        assert_eq!(t.effects, vec![Effect::ReleaseCamera]);

        let t = m.transition(FlowEvent::FaceCaptured);
        assert_eq!(t.next, CaptureStage::Matching);

        let t = m.transition(FlowEvent::MatchScored { score: 0.85 });
        assert_eq!(t.next, CaptureStage::Summary);
        assert!(t.error.is_none());

        m.transition(FlowEvent::SummaryConfirmed);
        m.transition(FlowEvent::ProofGenerated);
        let t = m.transition(FlowEvent::TransactionSubmitted);
        assert_eq!(t.next, CaptureStage::Complete);
        assert_eq!(t.effects, vec![Effect::StopPolling]);
        assert!(m.stage().is_terminal());
    }

    #[test]
    fn low_match_score_returns_to_face_with_error() {
        let mut m = machine();
        m.transition(FlowEvent::DocumentValidated);
        m.transition(FlowEvent::FaceCaptured);

        let t = m.transition(FlowEvent::MatchScored { score: 0.41 });
        assert_eq!(t.next, CaptureStage::Face);
        assert_eq!(t.effects, vec![Effect::ClearFaceFrame]);
        let err = t.error.unwrap();
        assert!(err.contains("0.41"));
        assert!(err.contains("0.70"));

        // The document stage is not revisited; a new face capture proceeds.
        let t = m.transition(FlowEvent::FaceCaptured);
        assert_eq!(t.next, CaptureStage::Matching);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut m = machine();
        m.transition(FlowEvent::DocumentValidated);
        m.transition(FlowEvent::FaceCaptured);
        let t = m.transition(FlowEvent::MatchScored { score: 0.70 });
        assert_eq!(t.next, CaptureStage::Summary);
    }

    #[test]
    fn cancel_from_any_stage_clears_everything() {
        for advance_by in 0..5 {
            let mut m = machine();
            let script = [
                FlowEvent::DocumentValidated,
                FlowEvent::FaceCaptured,
                FlowEvent::MatchScored { score: 0.9 },
                FlowEvent::SummaryConfirmed,
                FlowEvent::ProofGenerated,
            ];
            for event in script.iter().take(advance_by) {
                m.transition(event.clone());
            }

            let t = m.transition(FlowEvent::Cancel);
            assert_eq!(t.next, CaptureStage::Cancelled);
            assert!(t.effects.contains(&Effect::ReleaseCamera));
            assert!(t.effects.contains(&Effect::ClearCapturedImages));
            assert!(t.effects.contains(&Effect::StopPolling));
        }
    }

    #[test]
    fn retry_reenters_stage_clearing_attempt_data() {
        let mut m = machine();
        let t = m.transition(FlowEvent::RetryStage);
        assert_eq!(t.next, CaptureStage::Document);
        assert_eq!(t.effects, vec![Effect::ClearCapturedImages]);

        m.transition(FlowEvent::DocumentValidated);
        let t = m.transition(FlowEvent::RetryStage);
        assert_eq!(t.next, CaptureStage::Face);
        assert_eq!(t.effects, vec![Effect::ClearFaceFrame]);
    }

    #[test]
    fn out_of_order_events_are_rejected_in_place() {
        let mut m = machine();
        let t = m.transition(FlowEvent::FaceCaptured);
        assert_eq!(t.next, CaptureStage::Document);
        assert!(t.error.is_some());
        assert!(t.effects.is_empty());
    }

    #[test]
    fn terminal_stages_reject_all_events() {
        let mut m = machine();
        m.transition(FlowEvent::Cancel);
        let t = m.transition(FlowEvent::DocumentValidated);
        assert_eq!(t.next, CaptureStage::Cancelled);
        assert!(t.error.is_some());

        let t = m.transition(FlowEvent::Cancel);
        assert!(t.error.is_some(), "cancel is not re-entrant once terminal");
    }
}
