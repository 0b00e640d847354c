//! Transcript replay: linear validation of the signed round chain.
//!
//! Replay never returns `Err` for evidence problems; findings are data in
//! the `ReplayResult` so the resolver can reason about them. The hash
//! chain is intrinsically sequential, so rounds are always processed in
//! order from round 0.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::crypto::{ed25519_verify, HashProvider};
use crate::error::Result;
use crate::transcript::builder::strip_keys;
use crate::transcript::types::{Transcript, SIGNATURE_SCHEME, TRANSCRIPT_VERSION};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayErrorType {
    SignatureInvalid,
    HashChainBroken,
    FinalHashMismatch,
    TimestampNonMonotonic,
    RoundSequenceInvalid,
    InvalidStructure,
}

impl ReplayErrorType {
    /// Whether this finding invalidates the signed chain (as opposed to
    /// only downgrading confidence).
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ReplayErrorType::SignatureInvalid
                | ReplayErrorType::HashChainBroken
                | ReplayErrorType::RoundSequenceInvalid
                | ReplayErrorType::InvalidStructure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayError {
    #[serde(rename = "type")]
    pub error_type: ReplayErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityStatus {
    Valid,
    Tampered,
    Invalid,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub ok: bool,
    pub integrity_status: IntegrityStatus,
    pub errors: Vec<ReplayError>,
    pub warnings: Vec<String>,
    pub signature_verifications: u32,
    pub hash_chain_verifications: u32,
    pub rounds_verified: u32,
    /// Index of the highest round verified contiguously from round 0;
    /// -1 when no round verified.
    pub last_valid_round: i64,
    /// The LVSH: `round_hash` of `last_valid_round`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_valid_hash: Option<String>,
}

impl ReplayResult {
    fn structural_failure(message: String) -> ReplayResult {
        ReplayResult {
            ok: false,
            integrity_status: IntegrityStatus::Invalid,
            errors: vec![ReplayError {
                error_type: ReplayErrorType::InvalidStructure,
                round_number: None,
                message,
            }],
            warnings: vec![],
            signature_verifications: 0,
            hash_chain_verifications: 0,
            rounds_verified: 0,
            last_valid_round: -1,
            last_valid_hash: None,
        }
    }

    pub fn has_error(&self, error_type: ReplayErrorType) -> bool {
        self.errors.iter().any(|e| e.error_type == error_type)
    }
}

/// Replay a transcript: verify structure, genesis link, per-round chain
/// links, round hashes and signatures, then the container hash.
pub fn replay(transcript: &Transcript, hasher: &dyn HashProvider) -> Result<ReplayResult> {
    if transcript.transcript_version != TRANSCRIPT_VERSION {
        return Ok(ReplayResult::structural_failure(format!(
            "unsupported transcript_version {:?} (expected {:?})",
            transcript.transcript_version, TRANSCRIPT_VERSION
        )));
    }
    if transcript.rounds.is_empty() && transcript.failure_event.is_none() {
        return Ok(ReplayResult::structural_failure(
            "transcript has no rounds and no failure event explaining why".to_string(),
        ));
    }

    let mut errors: Vec<ReplayError> = vec![];
    let mut warnings: Vec<String> = vec![];
    let mut signature_verifications = 0u32;
    let mut hash_chain_verifications = 0u32;
    let mut rounds_verified = 0u32;
    let mut last_valid_round: i64 = -1;
    let mut last_valid_hash: Option<String> = None;
    let mut contiguous = true;

    let genesis = hasher.sha256_hex(transcript.genesis_preimage().as_bytes());

    for (i, round) in transcript.rounds.iter().enumerate() {
        let mut round_ok = true;
        let n = i as u64;

        if round.round_number != n {
            errors.push(ReplayError {
                error_type: ReplayErrorType::RoundSequenceInvalid,
                round_number: Some(n),
                message: format!(
                    "round at position {} declares round_number {}",
                    n, round.round_number
                ),
            });
            round_ok = false;
        }

        let expected_prev = if i == 0 {
            genesis.clone()
        } else {
            transcript.rounds[i - 1].round_hash.clone()
        };
        if round.previous_round_hash != expected_prev {
            errors.push(ReplayError {
                error_type: ReplayErrorType::HashChainBroken,
                round_number: Some(n),
                message: if i == 0 {
                    "previous_round_hash of round 0 does not match the genesis hash".to_string()
                } else {
                    format!("previous_round_hash does not match round {} hash", i - 1)
                },
            });
            round_ok = false;
        } else {
            hash_chain_verifications += 1;
        }

        if i > 0 && round.timestamp_ms < transcript.rounds[i - 1].timestamp_ms {
            errors.push(ReplayError {
                error_type: ReplayErrorType::TimestampNonMonotonic,
                round_number: Some(n),
                message: format!(
                    "timestamp_ms {} is earlier than round {} ({})",
                    round.timestamp_ms,
                    i - 1,
                    transcript.rounds[i - 1].timestamp_ms
                ),
            });
        }

        let round_value = to_canonical_value(round)?;

        // Declared round_hash must equal the hash of the round minus the
        // round_hash field itself.
        let mut without_hash = round_value.clone();
        strip_keys(&mut without_hash, &["round_hash"])?;
        let expected_round_hash = hasher.sha256_hex(&canonical_json_bytes(&without_hash)?);
        if expected_round_hash != round.round_hash {
            errors.push(ReplayError {
                error_type: ReplayErrorType::HashChainBroken,
                round_number: Some(n),
                message: "declared round_hash does not match recomputed round hash".to_string(),
            });
            round_ok = false;
        } else {
            hash_chain_verifications += 1;
        }

        // Signature domain: the round body before signature and round
        // hash existed.
        let mut body = round_value;
        strip_keys(&mut body, &["signature", "round_hash"])?;
        let digest = hasher.sha256(&canonical_json_bytes(&body)?);
        let sig = &round.signature;
        if sig.scheme != SIGNATURE_SCHEME {
            errors.push(ReplayError {
                error_type: ReplayErrorType::SignatureInvalid,
                round_number: Some(n),
                message: format!("unsupported signature scheme {:?}", sig.scheme),
            });
            round_ok = false;
        } else if sig.signed_hash != hex::encode(digest) {
            errors.push(ReplayError {
                error_type: ReplayErrorType::SignatureInvalid,
                round_number: Some(n),
                message: "signed_hash does not match the round body hash".to_string(),
            });
            round_ok = false;
        } else {
            match ed25519_verify(&sig.signer_public_key_b58, &digest, &sig.signature_b58) {
                Ok(true) => signature_verifications += 1,
                Ok(false) => {
                    errors.push(ReplayError {
                        error_type: ReplayErrorType::SignatureInvalid,
                        round_number: Some(n),
                        message: "Ed25519 signature does not verify".to_string(),
                    });
                    round_ok = false;
                }
                Err(e) => {
                    errors.push(ReplayError {
                        error_type: ReplayErrorType::SignatureInvalid,
                        round_number: Some(n),
                        message: format!("signature could not be checked: {}", e),
                    });
                    round_ok = false;
                }
            }
        }

        if round.public_key_b58 != sig.signer_public_key_b58 {
            warnings.push(format!(
                "round {}: public_key_b58 differs from the signing key",
                n
            ));
        }

        if round_ok {
            rounds_verified += 1;
            if contiguous {
                last_valid_round = n as i64;
                last_valid_hash = Some(round.round_hash.clone());
            }
        } else {
            contiguous = false;
        }
    }

    // Container hash is a convenience check: a mismatch never resets the
    // LVSH or invalidates the signed chain.
    if let Some(declared) = &transcript.final_hash {
        let mut value = to_canonical_value(transcript)?;
        strip_keys(&mut value, &["final_hash"])?;
        let computed = hasher.sha256_hex(&canonical_json_bytes(&value)?);
        if &computed != declared {
            errors.push(ReplayError {
                error_type: ReplayErrorType::FinalHashMismatch,
                round_number: None,
                message: "final_hash does not match the transcript container hash".to_string(),
            });
            warnings.push(
                "final hash mismatch; LVSH computed from signed rounds only".to_string(),
            );
        } else {
            hash_chain_verifications += 1;
        }
    }

    let has_fatal = errors.iter().any(|e| e.error_type.is_fatal());
    let integrity_status = if has_fatal {
        IntegrityStatus::Invalid
    } else if errors.is_empty() {
        IntegrityStatus::Valid
    } else {
        IntegrityStatus::Partial
    };

    Ok(ReplayResult {
        ok: integrity_status == IntegrityStatus::Valid,
        integrity_status,
        errors,
        warnings,
        signature_verifications,
        hash_chain_verifications,
        rounds_verified,
        last_valid_round,
        last_valid_hash,
    })
}
