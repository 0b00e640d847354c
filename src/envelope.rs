//! Signed envelope: a message wrapped with the hash of its canonical
//! form and a detached Ed25519 signature over that hash.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::crypto::{ed25519_verify, sha256, sha256_hex};
use crate::error::{Error, Result};
use crate::signer::Keypair;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub message: Value,
    pub message_hash_hex: String,
    pub signer_public_key_b58: String,
    pub signature_b58: String,
    pub signed_at_ms: i64,
}

/// Canonicalize the message, hash it, sign the 32 hash bytes.
pub fn sign_envelope(message: &Value, keypair: &Keypair, now_ms: i64) -> Result<Envelope> {
    let canonical = canonical_json_bytes(message)?;
    let digest = sha256(&canonical);
    let signature_b58 = keypair.sign_b58(&digest);
    Ok(Envelope {
        message: message.clone(),
        message_hash_hex: hex::encode(digest),
        signer_public_key_b58: keypair.public_key_b58(),
        signature_b58,
        signed_at_ms: now_ms,
    })
}

/// Recompute the canonical hash, compare against the declared one, and
/// verify the signature with the declared public key.
pub fn verify_envelope(envelope: &Envelope) -> Result<()> {
    let canonical = canonical_json_bytes(&envelope.message)?;
    if sha256_hex(&canonical) != envelope.message_hash_hex {
        return Err(Error::EnvelopeHashMismatch);
    }
    let digest = sha256(&canonical);
    let ok = ed25519_verify(
        &envelope.signer_public_key_b58,
        &digest,
        &envelope.signature_b58,
    )?;
    if !ok {
        return Err(Error::EnvelopeSigInvalid);
    }
    Ok(())
}

/// Hash of the envelope itself (canonical form), used as a round's
/// `envelope_hash`.
pub fn envelope_hash(envelope: &Envelope) -> Result<String> {
    let value = to_canonical_value(envelope)?;
    crate::canonical::hash_canonical_hex(&value)
}
