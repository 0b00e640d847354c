//! Evidence bundle generation: a deterministic directory of the input
//! transcript (or its redacted view), the derived artifacts, the
//! rulebook, checksums, and a content-addressed manifest.
//!
//! Redaction is additive: a redacted view rewrites only top-level fields
//! outside every round's signature domain, and the `redacted_fields`
//! list pins each replaced path to the hash it replaced. SUMMARY.md
//! carries no timestamp so regeneration is byte-identical.

use crate::bundle::manifest::{
    compute_bundle_id, BundleManifest, BundleView, IntegrityFlags, ManifestEntry, RedactedField,
    BUNDLE_VERSION, CHECKSUMS_FILE, CONSTITUTION_PATH, GC_VIEW_PATH, INSURER_PATH, JUDGMENT_PATH,
    MANIFEST_FILE, SUMMARY_PATH,
};
use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::constitution;
use crate::crypto::HashProvider;
use crate::dbl::judgment::JudgmentArtifact;
use crate::dbl::resolve;
use crate::error::{Error, Result};
use crate::report::gc_view::render_gc_view;
use crate::report::insurer::summarize;
use crate::transcript::replay::{replay, IntegrityStatus};
use crate::transcript::types::Transcript;
use std::fs;
use std::path::Path;

pub struct BundleOptions {
    pub view: BundleView,
    pub constitution_text: String,
    pub now_ms: i64,
}

impl BundleOptions {
    pub fn new(view: BundleView, now_ms: i64) -> Self {
        BundleOptions {
            view,
            constitution_text: constitution::DEFAULT_CONSTITUTION.to_string(),
            now_ms,
        }
    }
}

/// Generate a bundle directory for a transcript. Returns the manifest.
pub fn generate_bundle(
    transcript: &Transcript,
    out_dir: &Path,
    opts: &BundleOptions,
    hasher: &dyn HashProvider,
) -> Result<BundleManifest> {
    let original_bytes = canonical_json_bytes(&to_canonical_value(transcript)?)?;
    let original_hash = hasher.sha256_hex(&original_bytes);

    let (shipped, redacted_fields) = match opts.view {
        BundleView::Internal => (transcript.clone(), None),
        BundleView::Partner | BundleView::Auditor => {
            let (view, fields) = redact_view(transcript);
            (view, Some(fields))
        }
    };
    let shipped_bytes = canonical_json_bytes(&to_canonical_value(&shipped)?)?;
    let shipped_hash = hasher.sha256_hex(&shipped_bytes);

    // Derived artifacts are computed from the shipped input so the
    // verifier's recompute gate closes over exactly what the bundle
    // carries.
    let replayed = replay(&shipped, hasher)?;
    let judgment = resolve(&shipped, &replayed)?;
    let constitution_hash = constitution::constitution_hash(&opts.constitution_text);
    let gc_view = render_gc_view(&shipped, &replayed, &judgment, &constitution_hash);
    let insurer = summarize(&shipped, &replayed, &judgment, false);

    let gc_bytes = gc_view.canonical_bytes()?;
    let judgment_bytes = judgment.canonical_bytes()?;
    let insurer_bytes = insurer.canonical_bytes()?;
    let constitution_bytes = opts.constitution_text.as_bytes().to_vec();
    let summary_bytes = render_summary(&shipped, &judgment, opts.view).into_bytes();

    let input_path = opts.view.input_path();
    let files: Vec<(&str, &str, &[u8], Option<String>)> = vec![
        (
            input_path,
            "transcript",
            &shipped_bytes,
            Some(shipped.transcript_version.clone()),
        ),
        (
            GC_VIEW_PATH,
            "gc_view",
            &gc_bytes,
            Some(crate::report::gc_view::GC_VIEW_VERSION.to_string()),
        ),
        (
            JUDGMENT_PATH,
            "judgment",
            &judgment_bytes,
            Some(judgment.version.clone()),
        ),
        (
            INSURER_PATH,
            "insurer_summary",
            &insurer_bytes,
            Some(crate::report::insurer::INSURER_SUMMARY_VERSION.to_string()),
        ),
        (CONSTITUTION_PATH, "constitution", &constitution_bytes, None),
        (SUMMARY_PATH, "summary", &summary_bytes, None),
    ];

    let mut entries: Vec<ManifestEntry> = vec![];
    for (path, entry_type, bytes, schema_version) in &files {
        write_file(out_dir, path, bytes)?;
        entries.push(ManifestEntry {
            entry_type: entry_type.to_string(),
            path: path.to_string(),
            content_hash: hasher.sha256_hex(bytes),
            schema_version: schema_version.clone(),
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut manifest = BundleManifest {
        bundle_version: BUNDLE_VERSION.to_string(),
        bundle_id: String::new(),
        transcript_hash: shipped_hash,
        original_transcript_hash: if opts.view == BundleView::Internal {
            None
        } else {
            Some(original_hash)
        },
        created_at_ms: opts.now_ms,
        view: opts.view,
        constitution_hash,
        entries,
        redacted_fields,
        integrity: IntegrityFlags {
            transcript_valid: replayed.integrity_status != IntegrityStatus::Invalid,
            decision_valid: true,
            all_hashes_verified: replayed.errors.is_empty(),
        },
    };
    manifest.bundle_id = compute_bundle_id(&manifest)?;

    let manifest_bytes = manifest.canonical_bytes()?;
    write_file(out_dir, MANIFEST_FILE, &manifest_bytes)?;

    let checksums = render_checksums(&manifest, &manifest_bytes, hasher);
    write_file(out_dir, CHECKSUMS_FILE, checksums.as_bytes())?;

    Ok(manifest)
}

/// Partner/auditor view: replace the policy and strategy hashes with
/// human-readable substitutes and drop the container hash (it cannot
/// match the rewritten fields). Round signatures are untouched.
fn redact_view(transcript: &Transcript) -> (Transcript, Vec<RedactedField>) {
    let mut view = transcript.clone();
    let mut fields: Vec<RedactedField> = vec![];

    let policy_violated = transcript
        .failure_event
        .as_ref()
        .map(|f| f.code == "PACT-101")
        .unwrap_or(false);
    fields.push(RedactedField {
        path: "policy_hash".to_string(),
        original_hash: transcript.policy_hash.clone(),
    });
    view.policy_hash = if policy_violated {
        "Policy violated".to_string()
    } else {
        "Policy satisfied".to_string()
    };

    fields.push(RedactedField {
        path: "strategy_hash".to_string(),
        original_hash: transcript.strategy_hash.clone(),
    });
    view.strategy_hash = "Verified strategy adherence".to_string();

    if let Some(final_hash) = &transcript.final_hash {
        fields.push(RedactedField {
            path: "final_hash".to_string(),
            original_hash: final_hash.clone(),
        });
        view.final_hash = None;
    }

    fields.sort_by(|a, b| a.path.cmp(&b.path));
    (view, fields)
}

/// `<64-hex>␣␣<path>\n` lines, sorted by path, trailing newline.
/// Covers every manifest entry plus the manifest itself.
fn render_checksums(
    manifest: &BundleManifest,
    manifest_bytes: &[u8],
    hasher: &dyn HashProvider,
) -> String {
    let mut lines: Vec<(String, String)> = manifest
        .entries
        .iter()
        .map(|e| (e.path.clone(), e.content_hash.clone()))
        .collect();
    lines.push((
        MANIFEST_FILE.to_string(),
        hasher.sha256_hex(manifest_bytes),
    ));
    lines.sort();
    let mut out = String::new();
    for (path, hash) in lines {
        out.push_str(&hash);
        out.push_str("  ");
        out.push_str(&path);
        out.push('\n');
    }
    out
}

fn render_summary(transcript: &Transcript, judgment: &JudgmentArtifact, view: BundleView) -> String {
    let determination = serde_json::to_value(judgment.dbl_determination)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();
    format!(
        "# Evidence Bundle Summary\n\n\
         - Transcript: `{}`\n\
         - Intent: `{}`\n\
         - View: {}\n\
         - Determination: {}\n\
         - Required action: {} ({})\n\
         - Confidence: {}\n\n\
         Derived artifacts under `derived/` are pure functions of the\n\
         input transcript and the included constitution; verify with\n\
         `pact-auditor evidence-verify <bundle>`.\n",
        transcript.transcript_id,
        transcript.intent_id,
        view.as_str(),
        determination,
        judgment.required_action,
        judgment.required_next_actor.as_str(),
        judgment.confidence,
    )
}

fn write_file(out_dir: &Path, rel: &str, bytes: &[u8]) -> Result<()> {
    let path = out_dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
    }
    fs::write(&path, bytes)
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Provider;
    use crate::signer::Keypair;
    use crate::transcript::builder::TranscriptBuilder;
    use crate::transcript::types::RoundType;
    use serde_json::json;

    fn accepted() -> Transcript {
        let buyer = Keypair::generate();
        let provider = Keypair::generate();
        let mut b = TranscriptBuilder::new("t-1", "i-1", "purchase", 1_000);
        b.add_round(RoundType::Intent, &json!({"type": "INTENT"}), &buyer, "b", 1_001)
            .unwrap();
        b.add_round(RoundType::Ask, &json!({"type": "ASK"}), &provider, "p", 1_002)
            .unwrap();
        b.add_round(RoundType::Accept, &json!({"type": "ACCEPT"}), &buyer, "b", 1_003)
            .unwrap();
        b.build_with_final_hash().unwrap()
    }

    #[test]
    fn test_internal_bundle_layout() {
        let t = accepted();
        let dir = tempfile::tempdir().unwrap();
        let opts = BundleOptions::new(BundleView::Internal, 5_000);
        let manifest = generate_bundle(&t, dir.path(), &opts, &Sha256Provider).unwrap();
        assert!(dir.path().join("MANIFEST.json").exists());
        assert!(dir.path().join("checksums.sha256").exists());
        assert!(dir.path().join("input/ORIGINAL.json").exists());
        assert!(dir.path().join("derived/gc_view.json").exists());
        assert!(dir.path().join("derived/judgment.json").exists());
        assert!(dir.path().join("derived/insurer_summary.json").exists());
        assert!(dir.path().join("constitution/CONSTITUTION_v1.md").exists());
        assert!(dir.path().join("SUMMARY.md").exists());
        assert!(manifest.bundle_id.starts_with("bundle-"));
        assert!(manifest.redacted_fields.is_none());
        assert!(manifest.integrity.all_hashes_verified);
    }

    #[test]
    fn test_bundle_id_stable_across_runs_and_clock() {
        let t = accepted();
        let dir1 = tempfile::tempdir().unwrap();
        let dir2 = tempfile::tempdir().unwrap();
        let m1 = generate_bundle(
            &t,
            dir1.path(),
            &BundleOptions::new(BundleView::Auditor, 5_000),
            &Sha256Provider,
        )
        .unwrap();
        let m2 = generate_bundle(
            &t,
            dir2.path(),
            &BundleOptions::new(BundleView::Auditor, 9_000),
            &Sha256Provider,
        )
        .unwrap();
        assert_eq!(m1.bundle_id, m2.bundle_id);
    }

    #[test]
    fn test_redacted_view_pins_original() {
        let t = accepted();
        let dir = tempfile::tempdir().unwrap();
        let opts = BundleOptions::new(BundleView::Partner, 5_000);
        let manifest = generate_bundle(&t, dir.path(), &opts, &Sha256Provider).unwrap();
        assert!(dir.path().join("input/VIEW.json").exists());
        assert!(!dir.path().join("input/ORIGINAL.json").exists());
        let fields = manifest.redacted_fields.as_ref().unwrap();
        assert!(fields.iter().any(|f| f.path == "policy_hash"
            && f.original_hash == t.policy_hash));
        assert!(fields.iter().any(|f| f.path == "strategy_hash"));
        // final_hash was set, so it is recorded and dropped from the view
        assert!(fields.iter().any(|f| f.path == "final_hash"));
        assert!(manifest.original_transcript_hash.is_some());
        assert_ne!(
            manifest.original_transcript_hash.as_ref().unwrap(),
            &manifest.transcript_hash
        );

        let shipped = Transcript::from_file(&dir.path().join("input/VIEW.json")).unwrap();
        assert_eq!(shipped.policy_hash, "Policy satisfied");
        assert_eq!(shipped.strategy_hash, "Verified strategy adherence");
        assert!(shipped.final_hash.is_none());
        // Redaction never touches signed rounds.
        assert_eq!(shipped.rounds, t.rounds);
    }

    #[test]
    fn test_checksums_format() {
        let t = accepted();
        let dir = tempfile::tempdir().unwrap();
        generate_bundle(
            &t,
            dir.path(),
            &BundleOptions::new(BundleView::Internal, 5_000),
            &Sha256Provider,
        )
        .unwrap();
        let checksums = std::fs::read_to_string(dir.path().join("checksums.sha256")).unwrap();
        assert!(checksums.ends_with('\n'));
        for line in checksums.lines() {
            let (hash, path) = line.split_once("  ").unwrap();
            assert_eq!(hash.len(), 64);
            assert!(!path.is_empty());
        }
        // Sorted by path.
        let paths: Vec<&str> = checksums
            .lines()
            .map(|l| l.split_once("  ").unwrap().1)
            .collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }
}
