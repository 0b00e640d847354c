pub mod judgment;
pub mod resolver;

pub use judgment::{
    Actor, Determination, JudgmentArtifact, JudgmentStatus, RecommendedAction, JUDGMENT_VERSION,
};
pub use resolver::resolve;
