//! Evidence bundle manifest and content-addressed bundle id.

use crate::canonical::{canonical_json_bytes, hash_canonical_hex, to_canonical_value};
use crate::error::Result;
use crate::transcript::builder::strip_keys;
use serde::{Deserialize, Serialize};

pub const BUNDLE_VERSION: &str = "pact-evidence-bundle/4.0";

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const CHECKSUMS_FILE: &str = "checksums.sha256";
pub const CONSTITUTION_PATH: &str = "constitution/CONSTITUTION_v1.md";
pub const ORIGINAL_PATH: &str = "input/ORIGINAL.json";
pub const VIEW_PATH: &str = "input/VIEW.json";
pub const GC_VIEW_PATH: &str = "derived/gc_view.json";
pub const JUDGMENT_PATH: &str = "derived/judgment.json";
pub const INSURER_PATH: &str = "derived/insurer_summary.json";
pub const SUMMARY_PATH: &str = "SUMMARY.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleView {
    Internal,
    Partner,
    Auditor,
}

impl BundleView {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleView::Internal => "internal",
            BundleView::Partner => "partner",
            BundleView::Auditor => "auditor",
        }
    }

    /// The input file shipped under this view.
    pub fn input_path(self) -> &'static str {
        match self {
            BundleView::Internal => ORIGINAL_PATH,
            BundleView::Partner | BundleView::Auditor => VIEW_PATH,
        }
    }
}

impl std::str::FromStr for BundleView {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "internal" => Ok(BundleView::Internal),
            "partner" => Ok(BundleView::Partner),
            "auditor" => Ok(BundleView::Auditor),
            other => Err(crate::error::Error::UnknownVariant(format!(
                "bundle view {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

/// One replaced path in a redacted view, pinned to the hash it replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedField {
    pub path: String,
    pub original_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityFlags {
    pub transcript_valid: bool,
    pub decision_valid: bool,
    pub all_hashes_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_version: String,
    pub bundle_id: String,
    pub transcript_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transcript_hash: Option<String>,
    pub created_at_ms: i64,
    pub view: BundleView,
    pub constitution_hash: String,
    pub entries: Vec<ManifestEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_fields: Option<Vec<RedactedField>>,
    pub integrity: IntegrityFlags,
}

impl BundleManifest {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = to_canonical_value(self)?;
        canonical_json_bytes(&value)
    }
}

/// `bundle-` + SHA-256 of the canonical manifest minus `bundle_id` and
/// `created_at_ms`. Any mutation of any listed entry changes the id;
/// regeneration at a different time does not.
pub fn compute_bundle_id(manifest: &BundleManifest) -> Result<String> {
    let mut value = to_canonical_value(manifest)?;
    strip_keys(&mut value, &["bundle_id", "created_at_ms"])?;
    Ok(format!("bundle-{}", hash_canonical_hex(&value)?))
}
