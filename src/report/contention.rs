//! Contention scanner: groups transcripts by intent fingerprint and
//! flags double commits.
//!
//! Output is sorted at every level so two scans of the same contents are
//! byte-identical regardless of file-system enumeration order.

use crate::canonical::canonical_json_bytes;
use crate::crypto::HashProvider;
use crate::error::{Error, Result};
use crate::transcript::types::{RoundType, Terminality, Transcript};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub const CONTENTION_REPORT_VERSION: &str = "contention_report/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Single,
    Multiple,
    DoubleCommit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionGroup {
    pub fingerprint: String,
    pub status: GroupStatus,
    pub transcript_ids: Vec<String>,
    pub terminal_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionReport {
    pub version: String,
    pub source_dir: String,
    pub groups: Vec<ContentionGroup>,
}

impl ContentionReport {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = crate::canonical::to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }

    /// Transcript ids flagged as double commits, sorted.
    pub fn double_commit_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.status == GroupStatus::DoubleCommit)
            .flat_map(|g| g.transcript_ids.iter().cloned())
            .collect();
        ids.sort();
        ids
    }
}

/// Equivalence class for commit detection: the canonical intent core
/// concatenated with the buyer's signing identity and the policy hash.
pub fn intent_fingerprint(transcript: &Transcript, hasher: &dyn HashProvider) -> Result<String> {
    let scope = metadata_field(transcript, "scope");
    let constraints = metadata_field(transcript, "constraints");
    let core = json!({
        "intent_type": transcript.intent_type,
        "scope": scope,
        "constraints": constraints,
    });
    let mut bytes = canonical_json_bytes(&core)?;
    bytes.extend_from_slice(
        transcript
            .buyer_public_key_b58()
            .unwrap_or_default()
            .as_bytes(),
    );
    bytes.extend_from_slice(transcript.policy_hash.as_bytes());
    Ok(hasher.sha256_hex(&bytes))
}

fn metadata_field(transcript: &Transcript, key: &str) -> Value {
    transcript
        .metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Whether the transcript reached a non-abort terminal state.
pub fn is_non_abort_terminal(transcript: &Transcript) -> bool {
    match transcript.rounds.last() {
        None => false,
        Some(last) => match last.round_type {
            RoundType::Accept | RoundType::SettlementCommit => true,
            RoundType::Abort | RoundType::Reject => false,
            _ => transcript
                .failure_event
                .as_ref()
                .map(|f| f.terminality == Terminality::Terminal)
                .unwrap_or(false),
        },
    }
}

/// Group already-loaded transcripts. `source_dir` is recorded verbatim.
pub fn scan_transcripts(
    transcripts: &[Transcript],
    source_dir: &str,
    hasher: &dyn HashProvider,
) -> Result<ContentionReport> {
    let mut by_fingerprint: BTreeMap<String, Vec<&Transcript>> = BTreeMap::new();
    for t in transcripts {
        let fp = intent_fingerprint(t, hasher)?;
        by_fingerprint.entry(fp).or_default().push(t);
    }

    let groups = by_fingerprint
        .into_iter()
        .map(|(fingerprint, members)| {
            let mut transcript_ids: Vec<String> =
                members.iter().map(|t| t.transcript_id.clone()).collect();
            transcript_ids.sort();
            let terminal_count =
                members.iter().filter(|t| is_non_abort_terminal(t)).count() as u32;
            let status = if members.len() == 1 {
                GroupStatus::Single
            } else if terminal_count >= 2 {
                GroupStatus::DoubleCommit
            } else {
                GroupStatus::Multiple
            };
            ContentionGroup {
                fingerprint,
                status,
                transcript_ids,
                terminal_count,
            }
        })
        .collect();

    Ok(ContentionReport {
        version: CONTENTION_REPORT_VERSION.to_string(),
        source_dir: source_dir.to_string(),
        groups,
    })
}

/// Scan every `*.json` transcript in a directory. A malformed file fails
/// the scan; no partial report is produced.
pub fn scan_dir(dir: &Path, hasher: &dyn HashProvider) -> Result<ContentionReport> {
    let transcripts = load_transcripts(dir)?;
    scan_transcripts(&transcripts, &dir.display().to_string(), hasher)
}

/// Load `*.json` transcripts from a directory in sorted filename order.
pub fn load_transcripts(dir: &Path) -> Result<Vec<Transcript>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Io(format!("Failed to read directory {}: {}", dir.display(), e)))?;
    let mut paths: Vec<std::path::PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    paths.sort();
    paths.iter().map(|p| Transcript::from_file(p)).collect()
}
