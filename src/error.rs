use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid canonical input: {0}")]
    InvalidCanonical(String),

    #[error("Envelope hash mismatch: declared message_hash_hex does not match canonical message")]
    EnvelopeHashMismatch,

    #[error("Envelope signature invalid")]
    EnvelopeSigInvalid,

    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Missing manifest: MANIFEST.json not found in bundle")]
    MissingManifest,

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, Error>;
