//! Structural schema for v4 negotiation transcripts.
//!
//! Everything here is an immutable input to the verifier. Fields inside
//! `failure_event` and `content_summary` are claims, not proofs: nothing
//! downstream trusts them without independent cryptographic backing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TRANSCRIPT_VERSION: &str = "pact-transcript/4.0";

/// Signature scheme tag carried by every round signature.
pub const SIGNATURE_SCHEME: &str = "ed25519";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundType {
    Intent,
    Ask,
    Bid,
    Counter,
    Accept,
    Reject,
    Abort,
    SettlementCommit,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSignature {
    pub signer_public_key_b58: String,
    pub signature_b58: String,
    /// Hex of the digest that was signed (the round body hash).
    pub signed_hash: String,
    pub scheme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u64,
    pub round_type: RoundType,
    pub message_hash: String,
    pub envelope_hash: String,
    pub signature: RoundSignature,
    pub timestamp_ms: i64,
    pub previous_round_hash: String,
    pub round_hash: String,
    pub agent_id: String,
    pub public_key_b58: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminality {
    Terminal,
    NonTerminal,
}

/// Failure claim attached by the party that aborted or observed the
/// failure. Untrusted: `evidence_refs` and `transcript_hash` are claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub code: String,
    pub stage: String,
    pub fault_domain: String,
    pub terminality: Terminality,
    pub evidence_refs: Vec<String>,
    pub timestamp: i64,
    pub transcript_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub transcript_version: String,
    pub transcript_id: String,
    pub intent_id: String,
    pub intent_type: String,
    pub created_at_ms: i64,
    pub policy_hash: String,
    pub strategy_hash: String,
    pub identity_snapshot_hash: String,
    pub rounds: Vec<Round>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_event: Option<FailureEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arbiter_decision_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Transcript {
    /// The preimage of the genesis hash: `<intent_id>:<created_at_ms>`.
    pub fn genesis_preimage(&self) -> String {
        format!("{}:{}", self.intent_id, self.created_at_ms)
    }

    /// Parse a transcript from JSON text.
    pub fn from_json(json: &str) -> Result<Transcript> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidTranscript(format!("failed to parse transcript: {}", e)))
    }

    /// Read and parse a transcript file.
    pub fn from_file(path: &std::path::Path) -> Result<Transcript> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Transcript::from_json(&s)
    }

    /// Buyer identity: the signer of round 0 (the INTENT originator).
    pub fn buyer_public_key_b58(&self) -> Option<&str> {
        self.rounds
            .first()
            .map(|r| r.signature.signer_public_key_b58.as_str())
    }

    /// Provider identity: the first signer that differs from the buyer.
    pub fn provider_public_key_b58(&self) -> Option<&str> {
        let buyer = self.buyer_public_key_b58()?;
        self.rounds
            .iter()
            .map(|r| r.signature.signer_public_key_b58.as_str())
            .find(|pk| *pk != buyer)
    }
}
