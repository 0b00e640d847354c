//! Passport recompute: fold per-transcript passport deltas into a
//! per-signer registry across one or more transcript directories.
//!
//! Merging is deterministic: directories in the order given, files in
//! sorted order within a directory, first occurrence wins on duplicate
//! transcript ids. Deltas accumulate in integer hundredths so totals
//! are exact.

use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::crypto::HashProvider;
use crate::dbl::judgment::Determination;
use crate::dbl::resolve;
use crate::error::Result;
use crate::report::contention::load_transcripts;
use crate::report::insurer::tier_for_hundredths;
use crate::transcript::replay::replay;
use crate::transcript::types::Transcript;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

pub const PASSPORT_REGISTRY_VERSION: &str = "passport_registry/1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportEntry {
    pub signer: String,
    pub transcripts: u32,
    pub delta_total: f64,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportRegistry {
    pub version: String,
    pub entries: Vec<PassportEntry>,
}

impl PassportRegistry {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }
}

#[derive(Default)]
struct Tally {
    transcripts: u32,
    delta_hundredths: i64,
}

pub fn recompute_passports(
    dirs: &[PathBuf],
    signer_filter: Option<&str>,
    hasher: &dyn HashProvider,
) -> Result<PassportRegistry> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for dir in dirs {
        for transcript in load_transcripts(dir)? {
            if !seen_ids.insert(transcript.transcript_id.clone()) {
                continue;
            }
            apply_transcript(&transcript, &mut tallies, hasher)?;
        }
    }

    let entries = tallies
        .into_iter()
        .filter(|(signer, _)| signer_filter.map(|f| f == signer).unwrap_or(true))
        .map(|(signer, tally)| PassportEntry {
            signer,
            transcripts: tally.transcripts,
            delta_total: tally.delta_hundredths as f64 / 100.0,
            tier: tier_for_hundredths(tally.delta_hundredths).to_string(),
        })
        .collect();

    Ok(PassportRegistry {
        version: PASSPORT_REGISTRY_VERSION.to_string(),
        entries,
    })
}

fn apply_transcript(
    transcript: &Transcript,
    tallies: &mut BTreeMap<String, Tally>,
    hasher: &dyn HashProvider,
) -> Result<()> {
    let replayed = replay(transcript, hasher)?;
    let judgment = resolve(transcript, &replayed)?;

    let buyer = transcript.buyer_public_key_b58().map(|s| s.to_string());
    let provider = transcript.provider_public_key_b58().map(|s| s.to_string());

    for signer in [&buyer, &provider].into_iter().flatten() {
        tallies.entry(signer.clone()).or_default().transcripts += 1;
    }

    // A concrete fault accrues to the at-fault party; the no-fault bonus
    // accrues to both parties; indeterminate outcomes accrue nothing.
    match judgment.dbl_determination {
        Determination::BuyerAtFault | Determination::BuyerRailAtFault => {
            if let Some(b) = &buyer {
                tallies.entry(b.clone()).or_default().delta_hundredths -= 5;
            }
        }
        Determination::ProviderAtFault | Determination::ProviderRailAtFault => {
            if let Some(p) = &provider {
                tallies.entry(p.clone()).or_default().delta_hundredths -= 5;
            }
        }
        Determination::NoFault => {
            for signer in [&buyer, &provider].into_iter().flatten() {
                tallies.entry(signer.clone()).or_default().delta_hundredths += 1;
            }
        }
        Determination::Indeterminate | Determination::IndeterminateTamper => {}
    }
    Ok(())
}
