use pact_auditor::constitution;
use pact_auditor::crypto::{sha256_hex, Sha256Provider};
use pact_auditor::dbl::judgment::{Actor, Determination, JudgmentStatus};
use pact_auditor::dbl::resolve;
use pact_auditor::report::gc_view::render_gc_view;
use pact_auditor::report::insurer::{summarize, Coverage};
use pact_auditor::signer::Keypair;
use pact_auditor::transcript::replay::{replay, IntegrityStatus, ReplayResult};
use pact_auditor::transcript::types::{FailureEvent, RoundType, Terminality, Transcript};
use pact_auditor::transcript::TranscriptBuilder;
use serde_json::json;

struct Fixture {
    transcript: Transcript,
}

impl Fixture {
    fn success() -> Fixture {
        let buyer = Keypair::generate();
        let provider = Keypair::generate();
        let mut b = TranscriptBuilder::new(
            "t-success1",
            "intent-success1-test",
            "purchase",
            1_000_000_000_000,
        );
        b.add_round(
            RoundType::Intent,
            &json!({"protocol_version": "4.0", "type": "INTENT"}),
            &buyer,
            "buyer-agent",
            1_000_000_000_001,
        )
        .unwrap();
        b.add_round(
            RoundType::Ask,
            &json!({"protocol_version": "4.0", "type": "ASK", "price": 40}),
            &provider,
            "provider-agent",
            1_000_000_000_002,
        )
        .unwrap();
        b.add_round(
            RoundType::Accept,
            &json!({"protocol_version": "4.0", "type": "ACCEPT"}),
            &buyer,
            "buyer-agent",
            1_000_000_000_003,
        )
        .unwrap();
        Fixture {
            transcript: b.build_with_final_hash().unwrap(),
        }
    }

    fn with_failure(mut self, code: &str, stage: &str) -> Fixture {
        self.transcript.failure_event = Some(FailureEvent {
            code: code.to_string(),
            stage: stage.to_string(),
            fault_domain: "unspecified".to_string(),
            terminality: Terminality::Terminal,
            evidence_refs: vec![],
            timestamp: 1_000_000_100_000,
            transcript_hash: String::new(),
        });
        // Re-stamping the container hash is the caller's job when they
        // want a clean PARTIAL-free replay.
        self.transcript.final_hash = None;
        self
    }

    fn replayed(&self) -> ReplayResult {
        replay(&self.transcript, &Sha256Provider).unwrap()
    }
}

/// Scenario: 3-round success. VALID, LVSH at round 2, NO_FAULT, covered.
#[test]
fn test_scenario_happy_path() {
    let f = Fixture::success();
    let r = f.replayed();
    assert_eq!(r.integrity_status, IntegrityStatus::Valid);
    assert_eq!(r.last_valid_round, 2);
    assert_eq!(
        f.transcript.rounds[0].previous_round_hash,
        "ee7e4e8263cfcd2d25783caa3dfff65e2dcb609c65024b7079fd1a5d96084eb4"
    );

    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.dbl_determination, Determination::NoFault);
    assert_eq!(j.status, JudgmentStatus::Ok);
    assert_eq!(j.passport_impact, 0.0);
    assert_eq!(j.confidence, 1.0);

    let insurer = summarize(&f.transcript, &r, &j, false);
    assert!(matches!(
        insurer.coverage,
        Coverage::Covered | Coverage::CoveredWithSurcharge
    ));
    assert_eq!(insurer.tier, "B");
}

/// Scenario: PACT-101 policy abort.
#[test]
fn test_scenario_policy_abort() {
    let f = Fixture::success().with_failure("PACT-101", "policy");
    let r = f.replayed();
    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.status, JudgmentStatus::Failed);
    assert_eq!(j.failure_code.as_deref(), Some("PACT-101"));
    assert_eq!(j.dbl_determination, Determination::BuyerAtFault);
    assert!(j.terminal);
    assert_eq!(j.required_next_actor, Actor::Buyer);
    assert_eq!(j.required_action, "FIX_POLICY_OR_PARAMS");
    assert_eq!(j.passport_impact, -0.05);
    assert!(j.confidence >= 0.85 && j.confidence <= 0.95);
    assert_eq!(j.confidence, 0.95);
}

/// Scenario: PACT-101 with a stale container hash downgrades to 0.90.
#[test]
fn test_scenario_policy_abort_with_final_hash_mismatch() {
    let mut f = Fixture::success().with_failure("PACT-101", "policy");
    f.transcript.final_hash = Some(sha256_hex(b"stale-container"));
    let r = f.replayed();
    assert_eq!(r.integrity_status, IntegrityStatus::Partial);
    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.confidence, 0.9);
    assert!(j
        .notes
        .as_deref()
        .unwrap()
        .contains("final hash mismatch; LVSH computed from signed rounds only"));
}

/// Scenario: ACCEPT then settlement timeout.
#[test]
fn test_scenario_settlement_timeout() {
    let f = Fixture::success().with_failure("PACT-404", "settlement");
    let r = f.replayed();
    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
    assert!(!j.terminal);
    assert_eq!(j.required_action, "COMPLETE_SETTLEMENT_OR_REFUND");
    assert!(j.confidence >= 0.80 && j.confidence <= 0.85);
}

/// Invariant: PACT-101 and PACT-331 are buyer-fault regardless of LVSH.
#[test]
fn test_invariant_buyer_fault_codes() {
    for code in ["PACT-101", "PACT-331"] {
        for rounds in [1usize, 2, 3] {
            let mut f = Fixture::success();
            f.transcript.rounds.truncate(rounds);
            f.transcript.final_hash = None;
            let f = f.with_failure(code, "negotiation");
            let r = f.replayed();
            let j = resolve(&f.transcript, &r).unwrap();
            assert_eq!(
                j.dbl_determination,
                Determination::BuyerAtFault,
                "code {} with {} rounds",
                code,
                rounds
            );
        }
    }
}

/// Invariant: PACT-330 is provider-fault regardless of LVSH.
#[test]
fn test_invariant_provider_fault_code() {
    for rounds in [1usize, 2, 3] {
        let mut f = Fixture::success();
        f.transcript.rounds.truncate(rounds);
        f.transcript.final_hash = None;
        let f = f.with_failure("PACT-330", "negotiation");
        let r = f.replayed();
        let j = resolve(&f.transcript, &r).unwrap();
        assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
    }
}

/// Law: judging the same transcript twice is byte-identical.
#[test]
fn test_judgment_byte_equality_across_runs() {
    let f = Fixture::success().with_failure("PACT-404", "settlement");
    let r1 = f.replayed();
    let r2 = f.replayed();
    let a = resolve(&f.transcript, &r1).unwrap().canonical_bytes().unwrap();
    let b = resolve(&f.transcript, &r2).unwrap().canonical_bytes().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_gc_view_settlement_flags() {
    let f = Fixture::success().with_failure("PACT-404", "settlement");
    let r = f.replayed();
    let j = resolve(&f.transcript, &r).unwrap();
    let view = render_gc_view(
        &f.transcript,
        &r,
        &j,
        &constitution::default_constitution_hash(),
    );
    // ACCEPT followed by a failure event: settlement attempted, but
    // money cannot be presumed moved.
    assert!(view.executive_summary.settlement_attempted);
    assert!(!view.executive_summary.money_moved);
    assert!(view.rules_applied.contains(&"SETTLE-1".to_string()));
}

#[test]
fn test_gc_view_pre_cryptographic_precedence() {
    for (code, expected) in [
        ("PACT-420", "PROVIDER_UNREACHABLE"),
        ("PACT-421", "PROVIDER_API_MISMATCH"),
    ] {
        let f = Fixture::success().with_failure(code, "transport");
        let r = f.replayed();
        let j = resolve(&f.transcript, &r).unwrap();
        let view = render_gc_view(
            &f.transcript,
            &r,
            &j,
            &constitution::default_constitution_hash(),
        );
        assert_eq!(view.executive_summary.status, expected);
        assert_eq!(j.dbl_determination, Determination::ProviderAtFault);
    }
}

#[test]
fn test_deadlock_escalates_to_arbiter() {
    let f = Fixture::success().with_failure("PACT-303", "negotiation");
    let r = f.replayed();
    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.dbl_determination, Determination::Indeterminate);
    assert_eq!(j.required_next_actor, Actor::Arbiter);
    assert_eq!(j.required_action, "ESCALATE");
    assert_eq!(j.passport_impact, 0.0);

    let insurer = summarize(&f.transcript, &r, &j, false);
    assert_eq!(insurer.coverage, Coverage::EscrowRequired);
}

#[test]
fn test_identity_snapshot_tamper_claim() {
    let f = Fixture::success().with_failure("PACT-201", "identity");
    let r = f.replayed();
    let j = resolve(&f.transcript, &r).unwrap();
    assert_eq!(j.dbl_determination, Determination::IndeterminateTamper);
    assert_eq!(j.status, JudgmentStatus::Indeterminate);
    assert!(j.terminal);
    assert_eq!(j.passport_impact, 0.0);

    let insurer = summarize(&f.transcript, &r, &j, false);
    assert_eq!(insurer.coverage, Coverage::Excluded);
}
