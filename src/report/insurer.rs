//! Insurer summary: coverage decision, tier mapping, risk flags.
//!
//! Coverage is a total function of the judgment and integrity state;
//! there is no "unrated" outcome.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::dbl::judgment::{Actor, Determination, JudgmentArtifact};
use crate::error::Result;
use crate::transcript::replay::{IntegrityStatus, ReplayErrorType, ReplayResult};
use crate::transcript::types::Transcript;
use serde::{Deserialize, Serialize};

pub const INSURER_SUMMARY_VERSION: &str = "insurer_summary/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coverage {
    Covered,
    CoveredWithSurcharge,
    EscrowRequired,
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurerSummary {
    pub version: String,
    pub transcript_id: String,
    pub coverage: Coverage,
    pub tier: String,
    pub passport_delta: f64,
    pub determination: Determination,
    pub integrity_status: IntegrityStatus,
    pub risk_flags: Vec<String>,
}

impl InsurerSummary {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }
}

/// Tier from a cumulative passport delta in hundredths.
pub fn tier_for_hundredths(delta: i64) -> &'static str {
    if delta < -10 {
        "D"
    } else if delta > 20 {
        "A"
    } else if delta < 0 {
        "C"
    } else {
        "B"
    }
}

pub fn summarize(
    transcript: &Transcript,
    replay: &ReplayResult,
    judgment: &JudgmentArtifact,
    double_commit: bool,
) -> InsurerSummary {
    let integrity_broken = matches!(
        replay.integrity_status,
        IntegrityStatus::Invalid | IntegrityStatus::Tampered
    );
    let signatures_intact = !replay.has_error(ReplayErrorType::SignatureInvalid);
    let determination = judgment.dbl_determination;

    // Surcharge is a provider-fault outcome only; escrow is reserved
    // for deadlocks escalated to the arbiter. Buyer and rail faults,
    // like everything else unnamed, are excluded.
    let coverage = if double_commit
        || integrity_broken
        || determination == Determination::IndeterminateTamper
    {
        Coverage::Excluded
    } else if determination == Determination::NoFault
        && replay.integrity_status == IntegrityStatus::Valid
    {
        Coverage::Covered
    } else if determination == Determination::ProviderAtFault && signatures_intact {
        Coverage::CoveredWithSurcharge
    } else if judgment.required_next_actor == Actor::Arbiter {
        Coverage::EscrowRequired
    } else {
        Coverage::Excluded
    };

    let mut risk_flags: Vec<String> = vec![];
    if double_commit {
        risk_flags.push("DOUBLE_COMMIT".to_string());
    }
    if integrity_broken {
        risk_flags.push("EVIDENCE_COMPROMISED".to_string());
    }
    if replay.has_error(ReplayErrorType::FinalHashMismatch) {
        risk_flags.push("FINAL_HASH_MISMATCH".to_string());
    }
    if determination == Determination::IndeterminateTamper {
        risk_flags.push("IDENTITY_TAMPER".to_string());
    }
    if transcript
        .failure_event
        .as_ref()
        .map(|f| f.code == "PACT-303")
        .unwrap_or(false)
    {
        risk_flags.push("DEADLOCK".to_string());
    }
    risk_flags.sort();

    let delta_hundredths = (judgment.passport_impact * 100.0).round() as i64;

    InsurerSummary {
        version: INSURER_SUMMARY_VERSION.to_string(),
        transcript_id: transcript.transcript_id.clone(),
        coverage,
        tier: tier_for_hundredths(delta_hundredths).to_string(),
        passport_delta: judgment.passport_impact,
        determination,
        integrity_status: replay.integrity_status,
        risk_flags,
    }
}
