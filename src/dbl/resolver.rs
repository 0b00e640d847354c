//! Default Blame Logic: deterministic judgment from a transcript and its
//! replay result.
//!
//! The resolver consults the signed chain and the untrusted failure
//! claim. Without signed evidence (broken chain or no valid round) it
//! never assigns fault. Confidence and passport impact are computed in
//! integer hundredths so emitted values are exact.

use crate::dbl::judgment::{
    Actor, Determination, JudgmentArtifact, JudgmentStatus, RecommendedAction, JUDGMENT_VERSION,
};
use crate::error::Result;
use crate::transcript::replay::{IntegrityStatus, ReplayErrorType, ReplayResult};
use crate::transcript::types::{RoundType, Transcript};
use serde_json::Value;

pub const ACTION_NONE: &str = "NONE";
pub const ACTION_FIX_POLICY_OR_PARAMS: &str = "FIX_POLICY_OR_PARAMS";
pub const ACTION_ABORT: &str = "ABORT";
pub const ACTION_ESCALATE: &str = "ESCALATE";
pub const ACTION_RETRY: &str = "RETRY";
pub const ACTION_COMPLETE_SETTLEMENT_OR_REFUND: &str = "COMPLETE_SETTLEMENT_OR_REFUND";
pub const ACTION_REQUEST_REPLAY: &str = "REQUEST_REPLAY";
pub const ACTION_RESUME_NEGOTIATION: &str = "RESUME_NEGOTIATION";

/// Target named by the gating recommendation; not a party.
pub const TARGET_SYSTEM: &str = "SYSTEM";

struct Ruling {
    determination: Determination,
    actor: Actor,
    action: &'static str,
    terminal: bool,
    confidence_hundredths: i64,
}

pub fn resolve(transcript: &Transcript, replay: &ReplayResult) -> Result<JudgmentArtifact> {
    let trusted = trusted_evidence(transcript, replay);
    let claimed = claimed_evidence(transcript);
    let final_hash_mismatch = replay.has_error(ReplayErrorType::FinalHashMismatch);
    let failure_code = transcript.failure_event.as_ref().map(|f| f.code.clone());

    // Gating: no fault assignment without signed evidence.
    if replay.integrity_status == IntegrityStatus::Invalid || replay.last_valid_round < 0 {
        let tampered = replay.integrity_status == IntegrityStatus::Invalid;
        let determination = if tampered {
            Determination::IndeterminateTamper
        } else {
            Determination::Indeterminate
        };
        let notes = if tampered {
            "signed chain did not verify; fault cannot be assigned"
        } else {
            "no contiguously verified round; fault cannot be assigned"
        };
        return Ok(finish(
            transcript,
            replay,
            Ruling {
                determination,
                actor: Actor::None,
                action: ACTION_REQUEST_REPLAY,
                terminal: false,
                confidence_hundredths: 50,
            },
            failure_code,
            trusted,
            claimed,
            vec![RecommendedAction {
                action: ACTION_REQUEST_REPLAY.to_string(),
                target: TARGET_SYSTEM.to_string(),
                evidence_refs: vec![],
                claimed_evidence_refs: None,
            }],
            "Evidence is insufficient or compromised; request a fresh replay.".to_string(),
            Some(notes.to_string()),
            final_hash_mismatch,
        ));
    }

    match &transcript.failure_event {
        None => {
            if accepted_in_prefix(transcript, replay) {
                // Happy path: terminal ACCEPT, nothing claimed against it.
                let ruling = Ruling {
                    determination: Determination::NoFault,
                    actor: Actor::None,
                    action: ACTION_NONE,
                    terminal: true,
                    confidence_hundredths: 100,
                };
                Ok(finish(
                    transcript,
                    replay,
                    ruling,
                    None,
                    trusted,
                    claimed,
                    vec![],
                    "No action required.".to_string(),
                    None,
                    final_hash_mismatch,
                ))
            } else {
                // Stalled without any failure claim: name the owed party
                // but do not assign fault.
                let (_, owed) = continuity(transcript, replay);
                let ruling = Ruling {
                    determination: Determination::Indeterminate,
                    actor: owed,
                    action: ACTION_RESUME_NEGOTIATION,
                    terminal: false,
                    confidence_hundredths: 60,
                };
                let actions = primary_actions(&ruling, &trusted, &claimed);
                Ok(finish(
                    transcript,
                    replay,
                    ruling,
                    None,
                    trusted,
                    claimed,
                    actions,
                    "Negotiation stalled without a failure claim; the owed party should resume or abort."
                        .to_string(),
                    None,
                    final_hash_mismatch,
                ))
            }
        }
        Some(event) => {
            let ruling = ruling_for_code(&event.code, transcript, replay);
            let recommendation = recommendation_for(&ruling);
            let actions = primary_actions(&ruling, &trusted, &claimed);
            Ok(finish(
                transcript,
                replay,
                ruling,
                failure_code,
                trusted,
                claimed,
                actions,
                recommendation,
                None,
                final_hash_mismatch,
            ))
        }
    }
}

/// The exhaustive failure-code table. PACT-101, PACT-330 and PACT-331
/// are invariant-form: the determination never depends on the LVSH
/// position.
fn ruling_for_code(code: &str, transcript: &Transcript, replay: &ReplayResult) -> Ruling {
    match code {
        "PACT-101" => Ruling {
            determination: Determination::BuyerAtFault,
            actor: Actor::Buyer,
            action: ACTION_FIX_POLICY_OR_PARAMS,
            terminal: true,
            confidence_hundredths: 95,
        },
        "PACT-201" => Ruling {
            determination: Determination::IndeterminateTamper,
            actor: Actor::None,
            action: ACTION_ABORT,
            terminal: true,
            confidence_hundredths: 90,
        },
        "PACT-303" => Ruling {
            determination: Determination::Indeterminate,
            actor: Actor::Arbiter,
            action: ACTION_ESCALATE,
            terminal: false,
            confidence_hundredths: 80,
        },
        "PACT-330" => Ruling {
            determination: Determination::ProviderAtFault,
            actor: Actor::None,
            action: ACTION_ABORT,
            terminal: true,
            confidence_hundredths: 85,
        },
        "PACT-331" => Ruling {
            determination: Determination::BuyerAtFault,
            actor: Actor::None,
            action: ACTION_ABORT,
            terminal: true,
            confidence_hundredths: 90,
        },
        "PACT-404" => {
            if accepted_in_prefix(transcript, replay) {
                Ruling {
                    determination: Determination::ProviderAtFault,
                    actor: Actor::Provider,
                    action: ACTION_COMPLETE_SETTLEMENT_OR_REFUND,
                    terminal: false,
                    confidence_hundredths: 85,
                }
            } else {
                let (determination, actor) = continuity(transcript, replay);
                Ruling {
                    determination,
                    actor,
                    action: ACTION_RETRY,
                    terminal: true,
                    confidence_hundredths: 70,
                }
            }
        }
        "PACT-420" | "PACT-421" => Ruling {
            determination: Determination::ProviderAtFault,
            actor: Actor::Provider,
            action: ACTION_RETRY,
            terminal: true,
            confidence_hundredths: 85,
        },
        "PACT-505" => {
            let (determination, actor) = continuity(transcript, replay);
            Ruling {
                determination,
                actor,
                action: ACTION_RETRY,
                terminal: false,
                confidence_hundredths: 80,
            }
        }
        _ => {
            let (determination, actor) = continuity(transcript, replay);
            Ruling {
                determination,
                actor,
                action: ACTION_RETRY,
                terminal: false,
                confidence_hundredths: 70,
            }
        }
    }
}

/// Continuity rule: the party that owed the next round at the anchor is
/// at fault. Derived from the protocol sequence, never from claims.
fn continuity(transcript: &Transcript, replay: &ReplayResult) -> (Determination, Actor) {
    let anchor = match anchor_round_type(transcript, replay) {
        Some(t) => t,
        None => return (Determination::Indeterminate, Actor::None),
    };
    match anchor {
        // After INTENT the provider owes ASK.
        RoundType::Intent => (Determination::ProviderAtFault, Actor::Provider),
        // After ASK the buyer owes BID / ACCEPT / REJECT.
        RoundType::Ask => (Determination::BuyerAtFault, Actor::Buyer),
        // After BID the provider owes COUNTER / ACCEPT / REJECT.
        RoundType::Bid => (Determination::ProviderAtFault, Actor::Provider),
        // After COUNTER the ball returns to the buyer.
        RoundType::Counter => (Determination::BuyerAtFault, Actor::Buyer),
        // After ACCEPT the provider owes settlement completion.
        RoundType::Accept => (Determination::ProviderAtFault, Actor::Provider),
        // Terminal or administrative rounds leave nothing owed.
        RoundType::Reject | RoundType::Abort | RoundType::SettlementCommit | RoundType::Admin => {
            (Determination::Indeterminate, Actor::None)
        }
    }
}

fn anchor_round_type(transcript: &Transcript, replay: &ReplayResult) -> Option<RoundType> {
    if replay.last_valid_round < 0 {
        return None;
    }
    transcript
        .rounds
        .get(replay.last_valid_round as usize)
        .map(|r| r.round_type)
}

fn accepted_in_prefix(transcript: &Transcript, replay: &ReplayResult) -> bool {
    if replay.last_valid_round < 0 {
        return false;
    }
    transcript.rounds[..=replay.last_valid_round as usize]
        .iter()
        .any(|r| r.round_type == RoundType::Accept)
}

/// Round hashes of the verified prefix plus the LVSH itself, first-seen
/// order, deduplicated. Chain order is semantic, so no sorting here.
fn trusted_evidence(transcript: &Transcript, replay: &ReplayResult) -> Vec<String> {
    let mut refs: Vec<String> = vec![];
    if replay.last_valid_round >= 0 {
        for round in &transcript.rounds[..=replay.last_valid_round as usize] {
            if !refs.contains(&round.round_hash) {
                refs.push(round.round_hash.clone());
            }
        }
    }
    if let Some(lvsh) = &replay.last_valid_hash {
        if !refs.contains(lvsh) {
            refs.push(lvsh.clone());
        }
    }
    refs
}

/// Every hash the failure event claims, sorted lexicographically and
/// deduplicated. A hash that is also trusted appears in both arrays.
fn claimed_evidence(transcript: &Transcript) -> Vec<String> {
    let mut refs: Vec<String> = transcript
        .failure_event
        .as_ref()
        .map(|f| f.evidence_refs.clone())
        .unwrap_or_default();
    refs.sort();
    refs.dedup();
    refs
}

fn last_valid_summary(transcript: &Transcript, replay: &ReplayResult) -> Value {
    if replay.last_valid_round < 0 {
        return Value::Null;
    }
    transcript
        .rounds
        .get(replay.last_valid_round as usize)
        .and_then(|r| r.content_summary.clone())
        .unwrap_or(Value::Null)
}

fn primary_actions(
    ruling: &Ruling,
    trusted: &[String],
    claimed: &[String],
) -> Vec<RecommendedAction> {
    if ruling.action == ACTION_NONE {
        return vec![];
    }
    vec![RecommendedAction {
        action: ruling.action.to_string(),
        target: ruling.actor.as_str().to_string(),
        evidence_refs: trusted.to_vec(),
        claimed_evidence_refs: if claimed.is_empty() {
            None
        } else {
            Some(claimed.to_vec())
        },
    }]
}

fn recommendation_for(ruling: &Ruling) -> String {
    match (ruling.determination, ruling.action) {
        (Determination::NoFault, _) => "No action required.".to_string(),
        (Determination::BuyerAtFault, ACTION_FIX_POLICY_OR_PARAMS) => {
            "Buyer must fix policy or parameters before retrying.".to_string()
        }
        (Determination::IndeterminateTamper, _) => {
            "Identity or evidence integrity is compromised; abort and escalate.".to_string()
        }
        (Determination::Indeterminate, ACTION_ESCALATE) => {
            "Deadlock; escalate to the arbiter with the signed prefix.".to_string()
        }
        (Determination::ProviderAtFault, ACTION_COMPLETE_SETTLEMENT_OR_REFUND) => {
            "Provider must complete settlement or refund the buyer.".to_string()
        }
        (Determination::BuyerAtFault, ACTION_ABORT) => {
            "Buyer committed the same intent twice; abort the duplicate.".to_string()
        }
        (Determination::ProviderAtFault, ACTION_ABORT) => {
            "Provider violated exclusivity; abort the conflicting commitment.".to_string()
        }
        (Determination::BuyerAtFault, _) => {
            "Continuity assigns fault to the buyer, who owed the next round.".to_string()
        }
        (Determination::ProviderAtFault, _) => {
            "Continuity assigns fault to the provider, who owed the next round.".to_string()
        }
        _ => "Retry once the blocking condition clears.".to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn finish(
    transcript: &Transcript,
    replay: &ReplayResult,
    ruling: Ruling,
    failure_code: Option<String>,
    trusted: Vec<String>,
    claimed: Vec<String>,
    recommended_actions: Vec<RecommendedAction>,
    recommendation: String,
    base_note: Option<String>,
    final_hash_mismatch: bool,
) -> JudgmentArtifact {
    let mut confidence_hundredths = ruling.confidence_hundredths;
    let mut notes: Vec<String> = base_note.into_iter().collect();
    if final_hash_mismatch {
        confidence_hundredths -= 5;
        notes.push("final hash mismatch; LVSH computed from signed rounds only".to_string());
    }

    let passport_hundredths: i64 = if ruling.determination.is_concrete_fault() {
        -5
    } else if ruling.determination == Determination::NoFault {
        1
    } else {
        0
    };

    let status = match ruling.determination {
        Determination::NoFault => JudgmentStatus::Ok,
        Determination::Indeterminate | Determination::IndeterminateTamper => {
            JudgmentStatus::Indeterminate
        }
        _ => JudgmentStatus::Failed,
    };

    JudgmentArtifact {
        version: JUDGMENT_VERSION.to_string(),
        status,
        failure_code,
        last_valid_round: replay.last_valid_round,
        last_valid_summary: last_valid_summary(transcript, replay),
        last_valid_hash: replay.last_valid_hash.clone(),
        required_next_actor: ruling.actor,
        required_action: ruling.action.to_string(),
        terminal: ruling.terminal,
        dbl_determination: ruling.determination,
        passport_impact: passport_hundredths as f64 / 100.0,
        confidence: confidence_hundredths as f64 / 100.0,
        recommendation,
        recommended_actions,
        evidence_refs: trusted,
        claimed_evidence_refs: claimed,
        notes: if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Provider;
    use crate::signer::Keypair;
    use crate::transcript::builder::TranscriptBuilder;
    use crate::transcript::replay::replay;
    use crate::transcript::types::{FailureEvent, Terminality};
    use serde_json::json;

    fn failure(code: &str, stage: &str) -> FailureEvent {
        FailureEvent {
            code: code.to_string(),
            stage: stage.to_string(),
            fault_domain: "unspecified".to_string(),
            terminality: Terminality::Terminal,
            evidence_refs: vec![],
            timestamp: 1_000_000_000_010,
            transcript_hash: String::new(),
        }
    }

    fn negotiation(upto: &[RoundType]) -> (Transcript, ReplayResult) {
        let buyer = Keypair::generate();
        let provider = Keypair::generate();
        let mut b = TranscriptBuilder::new("t-1", "i-1", "purchase", 1_000_000_000_000);
        for (i, rt) in upto.iter().enumerate() {
            let (kp, agent) = match rt {
                RoundType::Intent | RoundType::Bid | RoundType::Accept | RoundType::Reject => {
                    (&buyer, "buyer-agent")
                }
                _ => (&provider, "provider-agent"),
            };
            b.add_round(
                *rt,
                &json!({"protocol_version": "4.0", "type": "X"}),
                kp,
                agent,
                1_000_000_000_000 + i as i64,
            )
            .unwrap();
        }
        let t = b.build();
        let r = replay(&t, &Sha256Provider).unwrap();
        (t, r)
    }

    #[test]
    fn test_happy_path_no_fault() {
        let (t, r) = negotiation(&[RoundType::Intent, RoundType::Ask, RoundType::Accept]);
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.status, JudgmentStatus::Ok);
        assert_eq!(j.dbl_determination, Determination::NoFault);
        assert!(j.terminal);
        assert_eq!(j.required_next_actor, Actor::None);
        assert_eq!(j.required_action, "NONE");
        assert_eq!(j.confidence, 1.0);
        assert_eq!(j.passport_impact, 0.0);
        assert_eq!(j.recommendation, "No action required.");
    }

    fn with_failure(mut t: Transcript, event: FailureEvent) -> (Transcript, ReplayResult) {
        t.failure_event = Some(event);
        let r = replay(&t, &Sha256Provider).unwrap();
        (t, r)
    }

    #[test]
    fn test_pact_101_buyer_at_fault_regardless_of_position() {
        for stages in [
            vec![RoundType::Intent],
            vec![RoundType::Intent, RoundType::Ask],
            vec![RoundType::Intent, RoundType::Ask, RoundType::Bid],
        ] {
            let (t, _) = negotiation(&stages);
            let (t, r) = with_failure(t, failure("PACT-101", "policy"));
            let j = resolve(&t, &r).unwrap();
            assert_eq!(j.dbl_determination, Determination::BuyerAtFault);
            assert_eq!(j.status, JudgmentStatus::Failed);
            assert_eq!(j.required_action, ACTION_FIX_POLICY_OR_PARAMS);
            assert!(j.terminal);
            assert_eq!(j.passport_impact, -0.05);
            assert_eq!(j.confidence, 0.95);
        }
    }

    #[test]
    fn test_pact_330_provider_at_fault_regardless_of_position() {
        for stages in [
            vec![RoundType::Intent],
            vec![RoundType::Intent, RoundType::Ask, RoundType::Accept],
        ] {
            let (t, _) = negotiation(&stages);
            let (t, r) = with_failure(t, failure("PACT-330", "negotiation"));
            let j = resolve(&t, &r).unwrap();
            assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
        }
    }

    #[test]
    fn test_pact_331_buyer_at_fault() {
        let (t, _) = negotiation(&[RoundType::Intent, RoundType::Ask, RoundType::Accept]);
        let (t, r) = with_failure(t, failure("PACT-331", "negotiation"));
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.dbl_determination, Determination::BuyerAtFault);
        assert_eq!(j.confidence, 0.9);
    }

    #[test]
    fn test_pact_404_with_accept_blames_provider() {
        let (t, _) = negotiation(&[RoundType::Intent, RoundType::Ask, RoundType::Accept]);
        let (t, r) = with_failure(t, failure("PACT-404", "settlement"));
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
        assert_eq!(j.required_action, ACTION_COMPLETE_SETTLEMENT_OR_REFUND);
        assert!(!j.terminal);
        assert_eq!(j.confidence, 0.85);
    }

    #[test]
    fn test_pact_404_without_accept_uses_continuity() {
        // Anchor is ASK: the buyer owed the next round.
        let (t, _) = negotiation(&[RoundType::Intent, RoundType::Ask]);
        let (t, r) = with_failure(t, failure("PACT-404", "settlement"));
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.dbl_determination, Determination::BuyerAtFault);
        assert_eq!(j.required_action, ACTION_RETRY);
        assert!(j.terminal);
        assert_eq!(j.confidence, 0.7);
    }

    #[test]
    fn test_unknown_code_continuity_after_intent_blames_provider() {
        let (t, _) = negotiation(&[RoundType::Intent]);
        let (t, r) = with_failure(t, failure("PACT-999", "unknown"));
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
        assert_eq!(j.required_next_actor, Actor::Provider);
        assert_eq!(j.confidence, 0.7);
    }

    #[test]
    fn test_gating_on_broken_chain() {
        let (mut t, _) = negotiation(&[RoundType::Intent, RoundType::Ask]);
        t.rounds[0].message_hash = crate::crypto::sha256_hex(b"forged");
        let r = replay(&t, &Sha256Provider).unwrap();
        assert_eq!(r.integrity_status, IntegrityStatus::Invalid);
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.status, JudgmentStatus::Indeterminate);
        assert_eq!(j.dbl_determination, Determination::IndeterminateTamper);
        assert_eq!(j.passport_impact, 0.0);
        assert!(j
            .recommended_actions
            .iter()
            .any(|a| a.action == ACTION_REQUEST_REPLAY && a.target == TARGET_SYSTEM));
    }

    #[test]
    fn test_confidence_downgrade_on_final_hash_mismatch() {
        let buyer = Keypair::generate();
        let mut b = TranscriptBuilder::new("t-1", "i-1", "purchase", 1_000);
        b.add_round(RoundType::Intent, &json!({"type": "INTENT"}), &buyer, "a", 1_001)
            .unwrap();
        let mut t = b.build();
        t.failure_event = Some(failure("PACT-101", "policy"));
        t.final_hash = Some(crate::crypto::sha256_hex(b"stale"));
        let r = replay(&t, &Sha256Provider).unwrap();
        let j = resolve(&t, &r).unwrap();
        assert_eq!(j.confidence, 0.9);
        assert!(j.notes.as_deref().unwrap().contains("final hash mismatch"));
    }

    #[test]
    fn test_evidence_split_trusted_vs_claimed() {
        let (t, _) = negotiation(&[RoundType::Intent, RoundType::Ask, RoundType::Accept]);
        let mut event = failure("PACT-404", "settlement");
        let shared = t.rounds[1].round_hash.clone();
        event.evidence_refs = vec!["zzz-claimed-hash".to_string(), shared.clone()];
        let (t, r) = with_failure(t, event);
        let j = resolve(&t, &r).unwrap();
        // Trusted refs are the chain prefix in order.
        assert_eq!(j.evidence_refs.len(), 3);
        assert_eq!(j.evidence_refs[1], shared);
        // A hash claimed and trusted appears in both arrays; claimed is sorted.
        assert!(j.claimed_evidence_refs.contains(&shared));
        assert!(j.claimed_evidence_refs.contains(&"zzz-claimed-hash".to_string()));
        let mut sorted = j.claimed_evidence_refs.clone();
        sorted.sort();
        assert_eq!(sorted, j.claimed_evidence_refs);
    }

    #[test]
    fn test_judgment_is_byte_deterministic() {
        let (t, r) = negotiation(&[RoundType::Intent, RoundType::Ask, RoundType::Accept]);
        let a = resolve(&t, &r).unwrap().canonical_bytes().unwrap();
        let b = resolve(&t, &r).unwrap().canonical_bytes().unwrap();
        assert_eq!(a, b);
    }
}
