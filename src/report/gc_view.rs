//! GC view: the reviewer-facing composition of judgment, integrity and
//! metadata for counsel.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::constitution;
use crate::dbl::judgment::{Determination, JudgmentArtifact, JudgmentStatus};
use crate::error::Result;
use crate::transcript::replay::{IntegrityStatus, ReplayError, ReplayResult};
use crate::transcript::types::{RoundType, Transcript};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GC_VIEW_VERSION: &str = "gc_view/1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionRef {
    pub hash: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub status: String,
    pub headline: String,
    pub money_moved: bool,
    pub settlement_attempted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyRef {
    pub role: String,
    pub signer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegritySection {
    pub status: IntegrityStatus,
    pub rounds_verified: u32,
    pub signature_verifications: u32,
    pub hash_chain_verifications: u32,
    pub errors: Vec<ReplayError>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcView {
    pub version: String,
    pub transcript_id: String,
    pub intent_id: String,
    pub constitution: ConstitutionRef,
    pub executive_summary: ExecutiveSummary,
    pub integrity: IntegritySection,
    pub judgment: JudgmentArtifact,
    pub parties: Vec<PartyRef>,
    pub rules_applied: Vec<String>,
    pub open_questions: Vec<String>,
}

impl GcView {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }
}

/// Compose the GC view. `constitution_hash` is the hash of the rulebook
/// actually loaded for this run, never the transcript's claim.
pub fn render_gc_view(
    transcript: &Transcript,
    replay: &ReplayResult,
    judgment: &JudgmentArtifact,
    constitution_hash: &str,
) -> GcView {
    let accepted = constitution::is_accepted(constitution_hash);
    let mut open_questions: Vec<String> = vec![];
    if !accepted {
        open_questions.push("NON_STANDARD_RULES".to_string());
    }

    GcView {
        version: GC_VIEW_VERSION.to_string(),
        transcript_id: transcript.transcript_id.clone(),
        intent_id: transcript.intent_id.clone(),
        constitution: ConstitutionRef {
            hash: constitution_hash.to_string(),
            accepted,
        },
        executive_summary: executive_summary(transcript, replay, judgment),
        integrity: IntegritySection {
            status: replay.integrity_status,
            rounds_verified: replay.rounds_verified,
            signature_verifications: replay.signature_verifications,
            hash_chain_verifications: replay.hash_chain_verifications,
            errors: replay.errors.clone(),
            warnings: replay.warnings.clone(),
        },
        judgment: judgment.clone(),
        parties: parties(transcript),
        rules_applied: rules_applied(transcript, replay, judgment),
        open_questions,
    }
}

/// Classification precedence: PACT-420 / PACT-421 are pre-cryptographic
/// failures and are reported before integrity evaluation.
fn executive_summary(
    transcript: &Transcript,
    replay: &ReplayResult,
    judgment: &JudgmentArtifact,
) -> ExecutiveSummary {
    let failure_code = transcript.failure_event.as_ref().map(|f| f.code.as_str());
    let status = match failure_code {
        Some("PACT-420") => "PROVIDER_UNREACHABLE".to_string(),
        Some("PACT-421") => "PROVIDER_API_MISMATCH".to_string(),
        _ => match replay.integrity_status {
            IntegrityStatus::Invalid | IntegrityStatus::Tampered => {
                "EVIDENCE_COMPROMISED".to_string()
            }
            IntegrityStatus::Partial => "PARTIAL_EVIDENCE".to_string(),
            IntegrityStatus::Valid => match judgment.status {
                JudgmentStatus::Ok => "RESOLVED_NO_FAULT".to_string(),
                JudgmentStatus::Failed => "RESOLVED_FAULT".to_string(),
                JudgmentStatus::Indeterminate => "UNRESOLVED".to_string(),
            },
        },
    };

    let has_accept = transcript
        .rounds
        .iter()
        .any(|r| r.round_type == RoundType::Accept);
    let settlement_commit_marker = transcript.rounds.iter().any(|r| {
        r.content_summary
            .as_ref()
            .and_then(|s| s.get("settlement_commit"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    });
    let money_moved =
        (has_accept && transcript.failure_event.is_none()) || settlement_commit_marker;
    let settlement_attempted = has_accept
        || transcript
            .failure_event
            .as_ref()
            .map(|f| f.stage == "settlement")
            .unwrap_or(false);

    let headline = format!(
        "{} round(s) verified; determination {}.",
        replay.rounds_verified,
        serde_json::to_value(judgment.dbl_determination)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .unwrap_or_default()
    );

    ExecutiveSummary {
        status,
        headline,
        money_moved,
        settlement_attempted,
    }
}

fn parties(transcript: &Transcript) -> Vec<PartyRef> {
    let mut parties: Vec<PartyRef> = vec![];
    if let Some(buyer) = transcript.buyer_public_key_b58() {
        parties.push(PartyRef {
            role: "buyer".to_string(),
            signer: buyer.to_string(),
        });
    }
    if let Some(provider) = transcript.provider_public_key_b58() {
        parties.push(PartyRef {
            role: "provider".to_string(),
            signer: provider.to_string(),
        });
    }
    parties.sort_by(|a, b| (&a.role, &a.signer).cmp(&(&b.role, &b.signer)));
    parties
}

/// Rule tags derived from the verification steps that actually ran.
/// DET-1 and GC-1 always apply; the rest mirror the constitution's
/// sections. Alphabetically sorted for stable output.
fn rules_applied(
    transcript: &Transcript,
    replay: &ReplayResult,
    judgment: &JudgmentArtifact,
) -> Vec<String> {
    let mut rules: BTreeSet<&'static str> = BTreeSet::new();
    rules.insert("DET-1");
    rules.insert("GC-1");
    if replay.last_valid_round >= 0 {
        rules.insert("LVSH-1");
    }
    if judgment.dbl_determination == Determination::IndeterminateTamper {
        rules.insert("TAMPER-1");
    }
    match transcript.failure_event.as_ref().map(|f| f.code.as_str()) {
        Some("PACT-101") => {
            rules.insert("FAULT-1");
        }
        Some("PACT-330") | Some("PACT-331") => {
            rules.insert("FAULT-2");
        }
        Some("PACT-404") => {
            if judgment.required_action == "COMPLETE_SETTLEMENT_OR_REFUND" {
                rules.insert("SETTLE-1");
            } else {
                rules.insert("FAULT-3");
            }
        }
        // Pre-cryptographic transport failures carry their own fixed
        // mapping, not a continuity ruling.
        Some("PACT-420") | Some("PACT-421") => {}
        Some(_) if judgment.dbl_determination.is_concrete_fault() => {
            rules.insert("FAULT-3");
        }
        _ => {}
    }
    rules.iter().map(|s| s.to_string()).collect()
}
