//! Constitution: the published rulebook whose hash pins which rules a
//! judgment was made under.
//!
//! Canonical text form: CRLF normalized to LF, trailing whitespace
//! stripped per line, lines joined with LF. The accepted-hash registry
//! is carried in-binary; non-matching constitutions are legal but are
//! flagged NON_STANDARD_RULES downstream.

use crate::crypto::sha256_hex;

/// The default rulebook shipped with the tool, embedded so bundle
/// generation never depends on external files.
pub const DEFAULT_CONSTITUTION: &str = "\
# PACT Default Blame Logic Constitution v1

This rulebook governs fault resolution for signed negotiation
transcripts. It is applied deterministically: the same transcript and
the same rulebook always produce the same judgment.

## DET-1 Determinism

Every judgment is a pure function of the signed transcript and this
rulebook. No wall-clock time, no external state, no discretion.

## GC-1 Evidence standard

Only material signed by a party is evidence. Claims embedded in failure
events or content summaries are recorded but never elevated to evidence
without independent cryptographic backing.

## LVSH-1 Last valid signed hash

The anchor of every judgment is the hash of the highest-indexed round
that verified contiguously from round 0. Nothing after the anchor is
attributed to either party.

## FAULT-1 Policy abort

A party that aborts for policy reasons before exchanging signed rounds
beyond its own policy gate bears the fault for the abort (PACT-101).

## FAULT-2 Exclusivity

A provider that signs conflicting exclusive commitments bears the fault
for the conflict (PACT-330). A buyer that commits the same intent twice
bears the fault for the double commit (PACT-331).

## FAULT-3 Continuity

Where no specific rule applies, the party that owed the next signed
round at the anchor bears the fault for the stall.

## TAMPER-1 Compromised evidence

If the signed chain does not verify, no fault is assigned. Compromised
evidence is escalated, never adjudicated.

## SETTLE-1 Settlement completion

After a signed ACCEPT, the provider owes settlement completion or a
refund (PACT-404).
";

/// Hashes of rulebooks accepted as standard.
pub const ACCEPTED_CONSTITUTION_HASHES: &[&str] =
    &["7515c64c3a3e75ad124ad208fa634574f46c203ff22dad30600d857729bb308b"];

/// Canonical text: CRLF to LF, per-line trailing whitespace stripped,
/// joined with LF.
pub fn canonical_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').map(|l| l.trim_end()).collect();
    lines.join("\n")
}

/// SHA-256 of the canonical rulebook text, lowercase hex.
pub fn constitution_hash(text: &str) -> String {
    sha256_hex(canonical_text(text).as_bytes())
}

pub fn is_accepted(hash: &str) -> bool {
    ACCEPTED_CONSTITUTION_HASHES.contains(&hash)
}

/// Hash of the embedded default rulebook.
pub fn default_constitution_hash() -> String {
    constitution_hash(DEFAULT_CONSTITUTION)
}
