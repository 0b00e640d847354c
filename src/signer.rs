//! Keypair and identity: Ed25519 signing keys with Base58 public
//! identities, plus an unencrypted on-disk key file for fixtures and
//! demos. The verification core never needs this module.

use crate::crypto::base58_encode;
use crate::error::{Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Single signing identity. The Base58 public key is the signer identity
/// carried in rounds and envelopes.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Keypair {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Keypair {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn public_key_b58(&self) -> String {
        base58_encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign message bytes; returns the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_bytes()
    }

    /// Sign message bytes; returns the signature in Base58.
    pub fn sign_b58(&self, message: &[u8]) -> String {
        base58_encode(&self.sign(message))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let stored = StoredKeypair {
            public_key_b58: self.public_key_b58(),
            secret_key_b58: base58_encode(&self.signing_key.to_bytes()),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::Json(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create key dir: {}", e)))?;
        }
        fs::write(path, json).map_err(|e| Error::Io(format!("Failed to write key file: {}", e)))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read key file {}: {}", path.display(), e)))?;
        let stored: StoredKeypair =
            serde_json::from_str(&s).map_err(|e| Error::Json(format!("Invalid key file: {}", e)))?;
        let secret: [u8; 32] = crate::crypto::base58_decode(&stored.secret_key_b58)?
            .try_into()
            .map_err(|_| Error::InvalidKey("secret key must be 32 bytes".to_string()))?;
        let kp = Keypair::from_secret_bytes(&secret);
        if kp.public_key_b58() != stored.public_key_b58 {
            return Err(Error::InvalidKey(
                "stored public key does not match secret key".to_string(),
            ));
        }
        Ok(kp)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredKeypair {
    public_key_b58: String,
    secret_key_b58: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ed25519_verify;

    #[test]
    fn test_sign_verify_round_trip() {
        let kp = Keypair::generate();
        let sig = kp.sign_b58(b"hello");
        assert!(ed25519_verify(&kp.public_key_b58(), b"hello", &sig).unwrap());
    }

    #[test]
    fn test_key_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        let kp = Keypair::generate();
        kp.save_to_file(&path).unwrap();
        let loaded = Keypair::load_from_file(&path).unwrap();
        assert_eq!(loaded.public_key_b58(), kp.public_key_b58());
    }
}
