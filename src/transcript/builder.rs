//! Append-only construction of signed transcripts.
//!
//! The live protocol handler is out of scope; this builder exists so
//! fixtures, demos, and tests produce transcripts whose hash domains are
//! exactly the ones the replay engine recomputes. Construction order
//! resolves the two domains without circularity: the signature is made
//! over the round body before `signature` or `round_hash` exist, and the
//! chain hash is made after the signature is attached.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::crypto::{sha256, sha256_hex};
use crate::envelope::{envelope_hash, sign_envelope};
use crate::error::{Error, Result};
use crate::signer::Keypair;
use crate::transcript::types::{
    FailureEvent, Round, RoundSignature, RoundType, Transcript, SIGNATURE_SCHEME,
    TRANSCRIPT_VERSION,
};
use serde_json::Value;

pub struct TranscriptBuilder {
    transcript: Transcript,
}

impl TranscriptBuilder {
    pub fn new(
        transcript_id: &str,
        intent_id: &str,
        intent_type: &str,
        created_at_ms: i64,
    ) -> Self {
        TranscriptBuilder {
            transcript: Transcript {
                transcript_version: TRANSCRIPT_VERSION.to_string(),
                transcript_id: transcript_id.to_string(),
                intent_id: intent_id.to_string(),
                intent_type: intent_type.to_string(),
                created_at_ms,
                policy_hash: sha256_hex(b"default-policy"),
                strategy_hash: sha256_hex(b"default-strategy"),
                identity_snapshot_hash: sha256_hex(b"default-identity-snapshot"),
                rounds: vec![],
                failure_event: None,
                final_hash: None,
                arbiter_decision_ref: None,
                metadata: None,
            },
        }
    }

    pub fn policy_hash(mut self, hash: &str) -> Self {
        self.transcript.policy_hash = hash.to_string();
        self
    }

    pub fn strategy_hash(mut self, hash: &str) -> Self {
        self.transcript.strategy_hash = hash.to_string();
        self
    }

    pub fn identity_snapshot_hash(mut self, hash: &str) -> Self {
        self.transcript.identity_snapshot_hash = hash.to_string();
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.transcript.metadata = Some(metadata);
        self
    }

    /// Sign and append the next round. The previous-round link comes from
    /// the current tip (or the genesis hash for round 0).
    pub fn add_round(
        &mut self,
        round_type: RoundType,
        message: &Value,
        keypair: &Keypair,
        agent_id: &str,
        timestamp_ms: i64,
    ) -> Result<&Round> {
        self.add_round_with_summary(round_type, message, keypair, agent_id, timestamp_ms, None)
    }

    pub fn add_round_with_summary(
        &mut self,
        round_type: RoundType,
        message: &Value,
        keypair: &Keypair,
        agent_id: &str,
        timestamp_ms: i64,
        content_summary: Option<Value>,
    ) -> Result<&Round> {
        let envelope = sign_envelope(message, keypair, timestamp_ms)?;
        let message_hash = envelope.message_hash_hex.clone();
        let env_hash = envelope_hash(&envelope)?;

        let previous_round_hash = match self.transcript.rounds.last() {
            Some(prev) => prev.round_hash.clone(),
            None => sha256_hex(self.transcript.genesis_preimage().as_bytes()),
        };

        let mut round = Round {
            round_number: self.transcript.rounds.len() as u64,
            round_type,
            message_hash,
            envelope_hash: env_hash,
            signature: RoundSignature {
                signer_public_key_b58: keypair.public_key_b58(),
                signature_b58: String::new(),
                signed_hash: String::new(),
                scheme: SIGNATURE_SCHEME.to_string(),
            },
            timestamp_ms,
            previous_round_hash,
            round_hash: String::new(),
            agent_id: agent_id.to_string(),
            public_key_b58: keypair.public_key_b58(),
            content_summary,
        };

        // Signature domain: the round body, before signature and chain
        // hash exist.
        let mut body = to_canonical_value(&round)?;
        strip_keys(&mut body, &["signature", "round_hash"])?;
        let digest = sha256(&canonical_json_bytes(&body)?);
        round.signature.signed_hash = hex::encode(digest);
        round.signature.signature_b58 = keypair.sign_b58(&digest);

        // Chain hash: covers everything including the signature object.
        let mut with_sig = to_canonical_value(&round)?;
        strip_keys(&mut with_sig, &["round_hash"])?;
        round.round_hash = sha256_hex(&canonical_json_bytes(&with_sig)?);

        self.transcript.rounds.push(round);
        Ok(self.transcript.rounds.last().unwrap())
    }

    pub fn failure_event(mut self, event: FailureEvent) -> Self {
        self.transcript.failure_event = Some(event);
        self
    }

    /// Finish without a container hash.
    pub fn build(self) -> Transcript {
        self.transcript
    }

    /// Finish and stamp the container hash over the whole transcript.
    pub fn build_with_final_hash(mut self) -> Result<Transcript> {
        let mut value = to_canonical_value(&self.transcript)?;
        strip_keys(&mut value, &["final_hash"])?;
        self.transcript.final_hash = Some(sha256_hex(&canonical_json_bytes(&value)?));
        Ok(self.transcript)
    }
}

/// Remove top-level keys from an object value; exclusion domains are
/// defined by key removal, never by nulling.
pub fn strip_keys(value: &mut Value, keys: &[&str]) -> Result<()> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| Error::InvalidCanonical("expected a JSON object".to_string()))?;
    for key in keys {
        obj.remove(*key);
    }
    Ok(())
}
