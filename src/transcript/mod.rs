pub mod builder;
pub mod replay;
pub mod types;

pub use builder::TranscriptBuilder;
pub use replay::{replay, IntegrityStatus, ReplayError, ReplayErrorType, ReplayResult};
pub use types::{
    FailureEvent, Round, RoundSignature, RoundType, Terminality, Transcript, TRANSCRIPT_VERSION,
};
