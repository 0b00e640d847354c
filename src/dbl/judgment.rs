//! Judgment artifact: the deterministic output of the blame resolver.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JUDGMENT_VERSION: &str = "dbl/2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgmentStatus {
    Ok,
    Failed,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Buyer,
    Provider,
    Rail,
    Settlement,
    Arbiter,
    None,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Buyer => "BUYER",
            Actor::Provider => "PROVIDER",
            Actor::Rail => "RAIL",
            Actor::Settlement => "SETTLEMENT",
            Actor::Arbiter => "ARBITER",
            Actor::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Determination {
    NoFault,
    BuyerAtFault,
    ProviderAtFault,
    BuyerRailAtFault,
    ProviderRailAtFault,
    Indeterminate,
    IndeterminateTamper,
}

impl Determination {
    /// True for determinations that name a concrete at-fault actor.
    pub fn is_concrete_fault(self) -> bool {
        matches!(
            self,
            Determination::BuyerAtFault
                | Determination::ProviderAtFault
                | Determination::BuyerRailAtFault
                | Determination::ProviderRailAtFault
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedAction {
    pub action: String,
    pub target: String,
    pub evidence_refs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_evidence_refs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgmentArtifact {
    pub version: String,
    pub status: JudgmentStatus,
    pub failure_code: Option<String>,
    pub last_valid_round: i64,
    pub last_valid_summary: Value,
    pub last_valid_hash: Option<String>,
    pub required_next_actor: Actor,
    pub required_action: String,
    pub terminal: bool,
    pub dbl_determination: Determination,
    pub passport_impact: f64,
    pub confidence: f64,
    pub recommendation: String,
    pub recommended_actions: Vec<RecommendedAction>,
    /// Round hashes from the verified prefix, chain order, deduplicated.
    pub evidence_refs: Vec<String>,
    /// Hashes claimed by the failure event, lexicographically sorted.
    pub claimed_evidence_refs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl JudgmentArtifact {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }

    pub fn judgment_hash(&self) -> Result<String> {
        Ok(crate::crypto::sha256_hex(&self.canonical_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JudgmentArtifact {
        JudgmentArtifact {
            version: JUDGMENT_VERSION.to_string(),
            status: JudgmentStatus::Ok,
            failure_code: None,
            last_valid_round: 2,
            last_valid_summary: Value::Null,
            last_valid_hash: Some("ab".repeat(32)),
            required_next_actor: Actor::None,
            required_action: "NONE".to_string(),
            terminal: true,
            dbl_determination: Determination::NoFault,
            passport_impact: 0.0,
            confidence: 1.0,
            recommendation: "No action required.".to_string(),
            recommended_actions: vec![],
            evidence_refs: vec![],
            claimed_evidence_refs: vec![],
            notes: None,
        }
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v.get("dblDetermination").is_some());
        assert!(v.get("lastValidRound").is_some());
        assert!(v.get("requiredNextActor").is_some());
        assert!(v.get("passportImpact").is_some());
        // failureCode serializes as an explicit null
        assert_eq!(v.get("failureCode"), Some(&json!(null)));
    }

    #[test]
    fn test_determination_wire_names() {
        assert_eq!(
            serde_json::to_string(&Determination::IndeterminateTamper).unwrap(),
            "\"INDETERMINATE_TAMPER\""
        );
        assert_eq!(
            serde_json::to_string(&Determination::BuyerRailAtFault).unwrap(),
            "\"BUYER_RAIL_AT_FAULT\""
        );
    }

    #[test]
    fn test_canonical_bytes_stable() {
        let j = sample();
        assert_eq!(j.canonical_bytes().unwrap(), j.canonical_bytes().unwrap());
        assert_eq!(j.judgment_hash().unwrap().len(), 64);
    }
}
