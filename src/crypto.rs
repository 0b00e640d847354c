//! Hashing, Ed25519 verification, Base58 encoding.
//!
//! Key derivation and signing live in `signer`; this module only needs
//! public material.

use crate::error::{Error, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// SHA-256 digest of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of arbitrary bytes, lowercase 64-hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Injectable hashing capability.
///
/// The replay engine, resolver, and renderers take `&dyn HashProvider`
/// so an instrumented or platform-specific backend can replace the
/// default without touching engine code.
pub trait HashProvider {
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    fn sha256_hex(&self, data: &[u8]) -> String {
        hex::encode(self.sha256(data))
    }
}

/// Default provider backed by the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Provider;

impl HashProvider for Sha256Provider {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        sha256(data)
    }
}

/// Encode bytes with the Bitcoin Base58 alphabet.
pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decode a Base58 string. Returns `Error::InvalidKey` on malformed input.
pub fn base58_decode(s: &str) -> Result<Vec<u8>> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| Error::InvalidKey(format!("invalid base58: {}", e)))
}

/// Decode a Base58 public key into a verifying key.
pub fn verifying_key_from_b58(public_key_b58: &str) -> Result<VerifyingKey> {
    let bytes = base58_decode(public_key_b58)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidKey("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Verify a detached Ed25519 signature (Base58) over `message`.
///
/// Malformed key or signature encodings are errors; a well-formed
/// signature that does not verify returns `Ok(false)`.
pub fn ed25519_verify(public_key_b58: &str, message: &[u8], signature_b58: &str) -> Result<bool> {
    let verifying_key = verifying_key_from_b58(public_key_b58)?;
    let sig_bytes = base58_decode(signature_b58)?;
    let arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| Error::SignatureVerification("signature must be 64 bytes".to_string()))?;
    let sig = Signature::from_bytes(&arr);
    Ok(verifying_key.verify(message, &sig).is_ok())
}
