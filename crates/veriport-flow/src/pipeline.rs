// SPDX-License-Identifier: Apache-2.0
//
// Async pipeline driver.
//
// Orchestrates one verification session: document capture and validation,
// live face capture, matching, claims derivation, proof and submission,
// advancing the [`CaptureMachine`] and executing its effect descriptors.
// Validation and matching are CPU-bound and run on the blocking pool under
// the configured timeout; a timeout surfaces as the retryable
// `RecognitionTimeout`. The camera is released before the next stage
// activates and on every error path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use tracing::{info, instrument, warn};
use veriport_capture::traits::{CameraConstraints, FrameSource};
use veriport_core::config::PipelineConfig;
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::{
    Claims, FaceMatchResult, PassportValidation, RawFrame, SessionId,
};
use veriport_document::face::FaceMatcher;
use veriport_document::regions::frame_to_image;
use veriport_document::validate::{PassportValidator, ValidationOutcome};

use crate::machine::{CaptureMachine, CaptureStage, Effect, FlowEvent};
use crate::proof::{
    claims_from_fields, derive_clauses, ProofArtifact, ProofBackend, SubmissionReceipt,
    Submitter,
};
use crate::retry::{should_retry, RetryConfig, RetryDecision};

/// Immutable identity of one capture attempt, threaded through stage calls.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext {
    pub session_id: SessionId,
    /// Zero-based attempt counter within the current stage.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

impl AttemptContext {
    pub fn first(session_id: SessionId) -> Self {
        Self {
            session_id,
            attempt: 0,
            started_at: Utc::now(),
        }
    }

    /// The context for the next attempt at the same stage.
    pub fn next(&self) -> Self {
        Self {
            session_id: self.session_id,
            attempt: self.attempt + 1,
            started_at: Utc::now(),
        }
    }
}

/// Everything a completed (or summary-stopped) session produced.
#[derive(Debug)]
pub struct VerificationReport {
    pub session_id: SessionId,
    pub validation: PassportValidation,
    pub match_result: FaceMatchResult,
    /// `None` when the MRZ was accepted leniently without decoded fields;
    /// no claims means no proof.
    pub claims: Option<Claims>,
    pub artifact: Option<ProofArtifact>,
    pub receipt: Option<SubmissionReceipt>,
    pub final_stage: CaptureStage,
}

/// Runs verification sessions against pluggable camera, prover and
/// submission backends.
pub struct StagePipeline {
    config: PipelineConfig,
    retry: RetryConfig,
    validator: Arc<PassportValidator>,
    matcher: Arc<FaceMatcher>,
}

impl StagePipeline {
    pub fn new(
        config: PipelineConfig,
        validator: Arc<PassportValidator>,
        matcher: Arc<FaceMatcher>,
    ) -> Self {
        Self {
            config,
            retry: RetryConfig::default(),
            validator,
            matcher,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Capture one document frame and run the full validation pass.
    ///
    /// The camera is opened, drained of one frame and released before the
    /// validation work starts, and released on every error path. A frame
    /// the configured policy rejects surfaces as [`VeriportError::DocumentInvalid`]
    /// so the stage can be retried with a fresh capture.
    #[instrument(skip_all, fields(session = %ctx.session_id, attempt = ctx.attempt))]
    pub async fn capture_and_validate(
        &self,
        camera: &mut dyn FrameSource,
        ctx: &AttemptContext,
    ) -> Result<ValidationOutcome> {
        let frame = grab_one(camera, &CameraConstraints::document())?;

        let validator = Arc::clone(&self.validator);
        let outcome = self
            .run_blocking(move || validator.validate_frame(&frame))
            .await?;

        if !outcome.validation.is_real_document {
            return Err(VeriportError::SpoofSuspected);
        }
        if !outcome.validation.is_valid {
            let detail = if outcome.validation.warnings.is_empty() {
                "required document elements missing".to_string()
            } else {
                outcome.validation.warnings.join("; ")
            };
            return Err(VeriportError::DocumentInvalid(detail));
        }
        Ok(outcome)
    }

    /// Capture one live face frame.
    pub async fn capture_face(&self, camera: &mut dyn FrameSource) -> Result<DynamicImage> {
        let frame = grab_one(camera, &CameraConstraints::face())?;
        frame_to_image(&frame)
    }

    /// Score the live capture against the document portrait.
    pub async fn score_match(
        &self,
        document_photo: DynamicImage,
        live_capture: DynamicImage,
    ) -> Result<FaceMatchResult> {
        let matcher = Arc::clone(&self.matcher);
        self.run_blocking(move || matcher.match_faces(&document_photo, &live_capture))
            .await
    }

    /// Drive a whole session end to end.
    ///
    /// Transient stage failures retry with backoff up to the retry budget;
    /// a match below threshold loops back to face capture on the same
    /// budget. When the document validated leniently without decoded MRZ
    /// fields the session stops at `Summary` — there is nothing to attest —
    /// and the report carries no proof.
    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn run(
        &self,
        session_id: SessionId,
        document_camera: &mut dyn FrameSource,
        face_camera: &mut dyn FrameSource,
        prover: &dyn ProofBackend,
        submitter: &dyn Submitter,
    ) -> Result<VerificationReport> {
        let mut machine = CaptureMachine::new(self.config.matching.face_match_threshold);

        // Document stage, with retries for transient failures.
        let mut ctx = AttemptContext::first(session_id);
        let outcome = loop {
            match self.capture_and_validate(document_camera, &ctx).await {
                Ok(outcome) => break outcome,
                Err(err) => {
                    document_camera.release();
                    match should_retry(&err, ctx.attempt, &self.retry) {
                        RetryDecision::RetryAfter(delay) => {
                            let t = machine.transition(FlowEvent::RetryStage);
                            self.apply_effects(&t.effects, document_camera, face_camera);
                            tokio::time::sleep(delay).await;
                            ctx = ctx.next();
                        }
                        RetryDecision::GiveUp(_) | RetryDecision::Exhausted => {
                            machine.transition(FlowEvent::Cancel);
                            return Err(err);
                        }
                    }
                }
            }
        };
        let t = machine.transition(FlowEvent::DocumentValidated);
        self.apply_effects(&t.effects, document_camera, face_camera);

        // Face + matching loop: a below-threshold score clears the face
        // frame and re-enters face capture, bounded by the retry budget.
        let mut face_attempt = 0u32;
        let match_result = loop {
            let live = match self.capture_face(face_camera).await {
                Ok(live) => live,
                Err(err) => {
                    face_camera.release();
                    machine.transition(FlowEvent::Cancel);
                    return Err(err);
                }
            };
            let t = machine.transition(FlowEvent::FaceCaptured);
            self.apply_effects(&t.effects, document_camera, face_camera);

            let result = self
                .score_match(outcome.photo_region.clone(), live)
                .await?;
            let t = machine.transition(FlowEvent::MatchScored {
                score: result.score,
            });
            self.apply_effects(&t.effects, document_camera, face_camera);

            if t.next == CaptureStage::Summary {
                break result;
            }
            face_attempt += 1;
            if face_attempt > self.retry.max_retries {
                warn!(score = result.score, "face match retries exhausted");
                machine.transition(FlowEvent::Cancel);
                return Err(VeriportError::MatchBelowThreshold {
                    score: result.score,
                    threshold: self.config.matching.face_match_threshold,
                });
            }
        };

        // Without decoded fields there is nothing to attest to.
        let Some(decode) = &outcome.decode else {
            info!("no decoded MRZ fields; stopping at summary");
            return Ok(VerificationReport {
                session_id,
                validation: outcome.validation,
                match_result,
                claims: None,
                artifact: None,
                receipt: None,
                final_stage: machine.stage(),
            });
        };

        machine.transition(FlowEvent::SummaryConfirmed);

        let today = Utc::now().date_naive();
        let claims = claims_from_fields(
            &decode.fields,
            match_result.score,
            self.config.mrz.dob_century_pivot as u32,
            self.config.mrz.expiry_horizon_years,
            today,
        )?;
        let clauses = derive_clauses(
            &claims,
            self.config.matching.face_match_threshold,
            today,
        );

        let artifact = prover.generate(&claims, &clauses)?;
        machine.transition(FlowEvent::ProofGenerated);

        let receipt = submitter.submit(&artifact)?;
        let t = machine.transition(FlowEvent::TransactionSubmitted);
        self.apply_effects(&t.effects, document_camera, face_camera);

        info!(stage = ?machine.stage(), "verification session complete");
        Ok(VerificationReport {
            session_id,
            validation: outcome.validation,
            match_result,
            claims: Some(claims),
            artifact: Some(artifact),
            receipt: Some(receipt),
            final_stage: machine.stage(),
        })
    }

    /// Execute transition effects against the session's resources. Frame
    /// clearing is handled by the owning scopes (frames drop when their
    /// stage loop re-enters); the externally visible effects are the camera
    /// releases.
    fn apply_effects(
        &self,
        effects: &[Effect],
        document_camera: &mut dyn FrameSource,
        face_camera: &mut dyn FrameSource,
    ) {
        for effect in effects {
            match effect {
                Effect::ReleaseCamera => {
                    document_camera.release();
                    face_camera.release();
                }
                Effect::ClearFaceFrame | Effect::ClearCapturedImages | Effect::StopPolling => {}
            }
        }
    }

    /// Run CPU-bound work on the blocking pool under the validation timeout.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let limit = self.config.timeouts.validation();
        match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
            Err(_) => Err(VeriportError::RecognitionTimeout(limit.as_secs())),
            Ok(Err(join_err)) => Err(VeriportError::RecognitionFailed(format!(
                "blocking worker failed: {join_err}"
            ))),
            Ok(Ok(result)) => result,
        }
    }
}

fn grab_one(camera: &mut dyn FrameSource, constraints: &CameraConstraints) -> Result<RawFrame> {
    camera.open(constraints)?;
    let frame = match camera.grab_frame() {
        Ok(frame) => frame,
        Err(err) => {
            camera.release();
            return Err(err);
        }
    };
    camera.release();
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use veriport_capture::doubles::{RecordingCamera, StaticCamera};
    use veriport_core::config::{PipelineConfig, RegionConfig, ValidationPolicy};
    use veriport_document::mrz::ocr::ScriptedRecognizer;
    use crate::proof::{SimulatedLedger, SimulatedProver};

    const SPECIMEN_L1: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<";
    const SPECIMEN_L2: &str = "L898902C36UTO7408122F1204159ZE184226B<<<<<10";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Document frame: skin-toned portrait band over textured paper.
    fn document_frame() -> RawFrame {
        let (w, h) = (640u32, 480u32);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                if y < 192 {
                    rgba.extend_from_slice(&[200, 150, 130, 255]);
                } else {
                    let v = ((x * 97 + y * 31) % 251) as u8;
                    rgba.extend_from_slice(&[v, (y % 200) as u8, v.wrapping_add(64), 255]);
                }
            }
        }
        RawFrame::new(w, h, rgba).unwrap()
    }

    /// Live selfie frame matching the portrait band's appearance.
    fn selfie_frame() -> RawFrame {
        RawFrame::filled(192, 192, [200, 150, 130, 255])
    }

    /// Textured paper everywhere, no portrait band.
    fn portraitless_frame() -> RawFrame {
        let (w, h) = (640u32, 480u32);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 97 + y * 31) % 251) as u8;
                rgba.extend_from_slice(&[v, (y % 200) as u8, v.wrapping_add(64), 255]);
            }
        }
        RawFrame::new(w, h, rgba).unwrap()
    }

    fn pipeline(lines: Vec<String>) -> StagePipeline {
        let config = PipelineConfig::default();
        let validator = PassportValidator::new(
            ValidationPolicy::default(),
            RegionConfig::default(),
            Box::new(ScriptedRecognizer::new(lines, 0.9)),
        );
        let matcher = FaceMatcher::with_default_encoder(config.matching.face_match_threshold);
        StagePipeline::new(config, Arc::new(validator), Arc::new(matcher))
    }

    #[tokio::test]
    async fn full_session_reaches_complete() {
        init_tracing();
        let pipeline = pipeline(vec![SPECIMEN_L1.to_string(), SPECIMEN_L2.to_string()]);
        let (mut doc_cam, doc_log) =
            RecordingCamera::new(StaticCamera::new([document_frame()]));
        let (mut face_cam, face_log) =
            RecordingCamera::new(StaticCamera::new([selfie_frame()]));

        let report = pipeline
            .run(
                SessionId::new(),
                &mut doc_cam,
                &mut face_cam,
                &SimulatedProver,
                &SimulatedLedger,
            )
            .await
            .unwrap();

        assert_eq!(report.final_stage, CaptureStage::Complete);
        assert!(report.validation.is_valid);
        let claims = report.claims.unwrap();
        assert_eq!(claims.name, "ERIKSSON ANNA MARIA");
        assert_eq!(claims.country_code, "UTO");
        assert!(report.artifact.is_some());
        assert!(report
            .receipt
            .unwrap()
            .transaction_id
            .starts_with("sim-"));

        // Every open was balanced by a release.
        assert!(doc_log.releases() >= doc_log.opens());
        assert!(face_log.releases() >= face_log.opens());
    }

    #[tokio::test]
    async fn unreadable_mrz_stops_at_summary_without_proof() {
        init_tracing();
        let pipeline = pipeline(vec!["nothing useful".to_string()]);
        let mut doc_cam = StaticCamera::new([document_frame()]);
        let mut face_cam = StaticCamera::new([selfie_frame()]);

        let report = pipeline
            .run(
                SessionId::new(),
                &mut doc_cam,
                &mut face_cam,
                &SimulatedProver,
                &SimulatedLedger,
            )
            .await
            .unwrap();

        assert_eq!(report.final_stage, CaptureStage::Summary);
        assert!(report.validation.is_valid, "lenient policy still validates");
        assert!(report.claims.is_none());
        assert!(report.artifact.is_none());
        assert!(report.receipt.is_none());
    }

    #[tokio::test]
    async fn strict_policy_fails_the_document_stage() {
        init_tracing();
        let config = PipelineConfig::default();
        let validator = PassportValidator::new(
            ValidationPolicy {
                accept_incomplete_document: false,
                ..Default::default()
            },
            RegionConfig::default(),
            Box::new(ScriptedRecognizer::new(
                vec![SPECIMEN_L1.to_string(), SPECIMEN_L2.to_string()],
                0.9,
            )),
        );
        let matcher = FaceMatcher::with_default_encoder(config.matching.face_match_threshold);
        let pipeline = StagePipeline::new(config, Arc::new(validator), Arc::new(matcher))
            .with_retry(RetryConfig {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            });

        // The MRZ decodes but no portrait is detected, so the strict policy
        // rejects the document and the session never reaches face capture.
        let mut doc_cam = StaticCamera::new([portraitless_frame()]);
        let mut face_cam = StaticCamera::new([selfie_frame()]);

        let err = pipeline
            .run(
                SessionId::new(),
                &mut doc_cam,
                &mut face_cam,
                &SimulatedProver,
                &SimulatedLedger,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VeriportError::DocumentInvalid(_)));
    }

    #[tokio::test]
    async fn screen_replay_aborts_the_session() {
        // Alternating bright/dark rows trip the replay heuristics.
        let (w, h) = (640u32, 480u32);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            let v = if y % 2 == 0 { 230u8 } else { 40u8 };
            for _ in 0..w {
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let replay = RawFrame::new(w, h, rgba).unwrap();

        let pipeline = pipeline(vec![SPECIMEN_L1.to_string(), SPECIMEN_L2.to_string()]);
        let (mut doc_cam, doc_log) = RecordingCamera::new(StaticCamera::new([replay]));
        let mut face_cam = StaticCamera::new([selfie_frame()]);

        let err = pipeline
            .run(
                SessionId::new(),
                &mut doc_cam,
                &mut face_cam,
                &SimulatedProver,
                &SimulatedLedger,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VeriportError::SpoofSuspected));
        // Camera not left open on the error path.
        assert!(doc_log.releases() >= doc_log.opens());
    }

    #[tokio::test]
    async fn empty_camera_is_a_capture_error() {
        let pipeline = pipeline(vec![SPECIMEN_L1.to_string(), SPECIMEN_L2.to_string()]);
        let mut doc_cam = StaticCamera::new([]);
        let mut face_cam = StaticCamera::new([selfie_frame()]);

        let err = pipeline
            .run(
                SessionId::new(),
                &mut doc_cam,
                &mut face_cam,
                &SimulatedProver,
                &SimulatedLedger,
            )
            .await
            .unwrap_err();
        // Transient capture failures retry, then exhaust.
        assert!(matches!(err, VeriportError::CaptureFailed(_)));
    }
}
