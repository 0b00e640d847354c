//! Bundle verification: checksum inspection plus the recompute gate.
//!
//! Checksums catch accidental corruption. The recompute gate catches the
//! sophisticated case where checksums and manifest were regenerated to
//! match altered derived content: derived artifacts are pure functions
//! of the shipped transcript, so a semantic change cannot survive a
//! clean recomputation.

use crate::bundle::manifest::{
    compute_bundle_id, BundleManifest, CHECKSUMS_FILE, CONSTITUTION_PATH, GC_VIEW_PATH,
    INSURER_PATH, JUDGMENT_PATH, MANIFEST_FILE,
};
use crate::canonical::{canonical_json_bytes, to_canonical_value};
use crate::config::TOOL_VERSION;
use crate::constitution;
use crate::crypto::HashProvider;
use crate::dbl::resolve;
use crate::error::{Error, Result};
use crate::report::gc_view::render_gc_view;
use crate::report::insurer::summarize;
use crate::transcript::replay::replay;
use crate::transcript::types::Transcript;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const VERIFY_REPORT_VERSION: &str = "auditor_pack_verify/1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub version: String,
    pub ok: bool,
    pub checksums_ok: bool,
    pub recompute_ok: bool,
    pub mismatches: Vec<String>,
    pub tool_version: String,
}

impl VerifyReport {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }
}

/// Verify a bundle directory. `path` may also point directly at the
/// manifest file inside the bundle.
pub fn verify_bundle_dir(
    path: &Path,
    allow_nonstandard: bool,
    hasher: &dyn HashProvider,
) -> Result<VerifyReport> {
    let dir = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent()
            .map(|p| p.to_path_buf())
            .ok_or(Error::MissingManifest)?
    };
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(Error::MissingManifest);
    }
    let manifest_bytes = fs::read(&manifest_path)
        .map_err(|e| Error::Io(format!("Failed to read manifest: {}", e)))?;
    let manifest: BundleManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| Error::InvalidBundle(format!("invalid manifest: {}", e)))?;

    let mut mismatches: Vec<String> = vec![];
    let mut checksums_ok = true;
    let mut recompute_ok = true;

    // 1. Every listed entry hashes to its declared content_hash.
    for entry in &manifest.entries {
        match fs::read(dir.join(&entry.path)) {
            Ok(bytes) => {
                if hasher.sha256_hex(&bytes) != entry.content_hash {
                    mismatches.push(format!("Hash mismatch: {}", entry.path));
                    checksums_ok = false;
                }
            }
            Err(_) => {
                mismatches.push(format!("Missing file: {}", entry.path));
                checksums_ok = false;
            }
        }
    }

    // 2. checksums.sha256 is verified identically, line by line.
    match fs::read_to_string(dir.join(CHECKSUMS_FILE)) {
        Ok(checksums) => {
            for line in checksums.lines() {
                match line.split_once("  ") {
                    Some((declared_hash, rel)) => match fs::read(dir.join(rel)) {
                        Ok(bytes) => {
                            if hasher.sha256_hex(&bytes) != declared_hash {
                                mismatches.push(format!("Hash mismatch: {}", rel));
                                checksums_ok = false;
                            }
                        }
                        Err(_) => {
                            mismatches.push(format!("Missing file: {}", rel));
                            checksums_ok = false;
                        }
                    },
                    None => {
                        mismatches.push(format!("Malformed checksum line: {}", line));
                        checksums_ok = false;
                    }
                }
            }
        }
        Err(_) => {
            mismatches.push(format!("Missing file: {}", CHECKSUMS_FILE));
            checksums_ok = false;
        }
    }

    // 3. Recompute gate: re-derive every artifact from the shipped
    // transcript and compare byte-for-byte.
    let input_path = manifest.view.input_path();
    match Transcript::from_file(&dir.join(input_path)) {
        Ok(shipped) => {
            let shipped_bytes = canonical_json_bytes(&to_canonical_value(&shipped)?)?;
            if hasher.sha256_hex(&shipped_bytes) != manifest.transcript_hash {
                mismatches.push("transcript_hash mismatch".to_string());
                recompute_ok = false;
            }

            let constitution_text = fs::read_to_string(dir.join(CONSTITUTION_PATH))
                .unwrap_or_default();
            let constitution_hash = constitution::constitution_hash(&constitution_text);

            let replayed = replay(&shipped, hasher)?;
            let judgment = resolve(&shipped, &replayed)?;
            let gc_view = render_gc_view(&shipped, &replayed, &judgment, &constitution_hash);
            let insurer = summarize(&shipped, &replayed, &judgment, false);

            let recomputed: [(&str, Vec<u8>); 3] = [
                (GC_VIEW_PATH, gc_view.canonical_bytes()?),
                (JUDGMENT_PATH, judgment.canonical_bytes()?),
                (INSURER_PATH, insurer.canonical_bytes()?),
            ];
            for (rel, expected) in &recomputed {
                let stored = fs::read(dir.join(rel)).unwrap_or_default();
                if &stored != expected {
                    let name = rel.rsplit('/').next().unwrap_or(rel);
                    mismatches.push(name.to_string());
                    recompute_ok = false;
                }
            }
        }
        Err(e) => {
            mismatches.push(format!("Unreadable input: {}", e));
            recompute_ok = false;
        }
    }

    // 4. Constitution integrity against the manifest and the accepted
    // registry.
    let mut nonstandard = false;
    match fs::read_to_string(dir.join(CONSTITUTION_PATH)) {
        Ok(text) => {
            let computed = constitution::constitution_hash(&text);
            if computed != manifest.constitution_hash {
                mismatches.push("constitution_hash mismatch".to_string());
                recompute_ok = false;
            }
            if !constitution::is_accepted(&computed) {
                mismatches.push("NON_STANDARD_RULES".to_string());
                nonstandard = true;
            }
        }
        Err(_) => {
            mismatches.push(format!("Missing file: {}", CONSTITUTION_PATH));
            checksums_ok = false;
        }
    }

    // 5. The bundle id must recompute from the manifest.
    if compute_bundle_id(&manifest)? != manifest.bundle_id {
        mismatches.push("bundle_id mismatch".to_string());
        recompute_ok = false;
    }

    let ok = checksums_ok && recompute_ok && (!nonstandard || allow_nonstandard);
    Ok(VerifyReport {
        version: VERIFY_REPORT_VERSION.to_string(),
        ok,
        checksums_ok,
        recompute_ok,
        mismatches,
        tool_version: TOOL_VERSION.to_string(),
    })
}

/// Verify a packed auditor ZIP by extracting to a scratch directory.
pub fn verify_zip(
    zip_path: &Path,
    allow_nonstandard: bool,
    hasher: &dyn HashProvider,
) -> Result<VerifyReport> {
    let scratch = tempfile::tempdir()
        .map_err(|e| Error::Io(format!("Failed to create scratch dir: {}", e)))?;
    crate::bundle::archive::unpack_zip(zip_path, scratch.path())?;
    verify_bundle_dir(scratch.path(), allow_nonstandard, hasher)
}
