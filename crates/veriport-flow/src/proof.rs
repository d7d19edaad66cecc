// SPDX-License-Identifier: Apache-2.0
//
// Claims derivation and the proof/submission boundary.
//
// Verified document and biometric data is projected into a small `Claims`
// struct, reduced to boolean clauses, and handed to a `ProofBackend`. The
// built-in backend is openly simulated: it hashes the canonical claims JSON
// with SHA-256, producing a stable artifact for the same input rather than
// pretending to be a zero-knowledge circuit. Real provers implement the same
// trait.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::{Claims, DocumentFields};
use veriport_document::mrz::{resolve_dob_year, resolve_expiry_year};

/// Days of remaining validity required by the `validity_6m` clause.
const VALIDITY_WINDOW_DAYS: i64 = 180;
/// Age in years required by the `adult` clause.
const ADULT_AGE_YEARS: i32 = 18;

/// Project decoded MRZ fields plus the face score into [`Claims`].
///
/// The two-digit MRZ years are resolved here: birth years pivot on
/// `dob_pivot` (at or above → 1900s), expiry years land in the unique
/// century within `(today - 100, today + horizon]` years.
///
/// # Errors
///
/// [`VeriportError::DecodeIncomplete`] when either date is not a calendar
/// date.
pub fn claims_from_fields(
    fields: &DocumentFields,
    face_match_score: f32,
    dob_pivot: u32,
    expiry_horizon_years: i32,
    today: NaiveDate,
) -> Result<Claims> {
    let date_of_birth = parse_mrz_date(&fields.date_of_birth, |yy| {
        resolve_dob_year(yy, dob_pivot)
    })?;
    let date_of_expiry = parse_mrz_date(&fields.date_of_expiry, |yy| {
        resolve_expiry_year(yy, today.year(), expiry_horizon_years)
    })?;

    Ok(Claims {
        name: fields.name.clone(),
        date_of_birth,
        date_of_expiry,
        country_code: fields.issuing_country.clone(),
        face_match_score,
    })
}

fn parse_mrz_date(yymmdd: &str, resolve_year: impl Fn(u32) -> i32) -> Result<NaiveDate> {
    let malformed = || VeriportError::DecodeIncomplete(format!("malformed MRZ date {yymmdd:?}"));

    if yymmdd.len() != 6 || !yymmdd.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    let yy: u32 = yymmdd[0..2].parse().map_err(|_| malformed())?;
    let mm: u32 = yymmdd[2..4].parse().map_err(|_| malformed())?;
    let dd: u32 = yymmdd[4..6].parse().map_err(|_| malformed())?;

    NaiveDate::from_ymd_opt(resolve_year(yy), mm, dd).ok_or_else(malformed)
}

/// Reduce claims to the boolean clauses the proof attests to.
///
/// Only clauses that hold are emitted; an absent clause is an absent
/// attestation, never a negative one.
#[instrument(skip_all)]
pub fn derive_clauses(claims: &Claims, threshold: f32, today: NaiveDate) -> Vec<String> {
    let mut clauses = Vec::with_capacity(4);

    if age_in_years(claims.date_of_birth, today) >= ADULT_AGE_YEARS {
        clauses.push("adult:true".to_string());
    }
    if !claims.country_code.is_empty() {
        clauses.push(format!("country:{}:true", claims.country_code));
    }
    if (claims.date_of_expiry - today).num_days() > VALIDITY_WINDOW_DAYS {
        clauses.push("validity_6m:true".to_string());
    }
    if claims.face_match_score >= threshold {
        clauses.push("facial_match:true".to_string());
    }

    debug!(count = clauses.len(), "derived proof clauses");
    clauses
}

fn age_in_years(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// The generated proof: an opaque hash over the attested clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofArtifact {
    /// Hex-encoded digest binding the claims and clauses.
    pub hash: String,
    pub clauses: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Acknowledgement from the submission backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub transaction_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Generates a proof artifact from claims and clauses.
pub trait ProofBackend: Send + Sync {
    fn generate(&self, claims: &Claims, clauses: &[String]) -> Result<ProofArtifact>;
}

/// Submits a generated proof, returning an opaque receipt.
pub trait Submitter: Send + Sync {
    fn submit(&self, artifact: &ProofArtifact) -> Result<SubmissionReceipt>;
}

/// Deterministic stand-in prover: SHA-256 over the canonical claims JSON
/// plus the clause list. The same claims always yield the same hash.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProver;

impl ProofBackend for SimulatedProver {
    #[instrument(skip_all)]
    fn generate(&self, claims: &Claims, clauses: &[String]) -> Result<ProofArtifact> {
        let canonical = serde_json::to_vec(claims)?;

        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        for clause in clauses {
            hasher.update(clause.as_bytes());
            hasher.update([0u8]);
        }
        let hash = hex::encode(hasher.finalize());

        info!(clauses = clauses.len(), "simulated proof generated");
        Ok(ProofArtifact {
            hash,
            clauses: clauses.to_vec(),
            generated_at: Utc::now(),
        })
    }
}

/// Submission backend that acknowledges locally, deriving the transaction id
/// from the proof hash.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLedger;

impl Submitter for SimulatedLedger {
    fn submit(&self, artifact: &ProofArtifact) -> Result<SubmissionReceipt> {
        let short = artifact.hash.get(..16).unwrap_or(&artifact.hash);
        Ok(SubmissionReceipt {
            transaction_id: format!("sim-{short}"),
            submitted_at: Utc::now(),
        })
    }
}
