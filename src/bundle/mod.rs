pub mod archive;
pub mod manifest;
pub mod verifier;
pub mod writer;

pub use archive::{pack_dir, unpack_zip};
pub use manifest::{
    BundleManifest, BundleView, IntegrityFlags, ManifestEntry, RedactedField, BUNDLE_VERSION,
};
pub use verifier::{verify_bundle_dir, verify_zip, VerifyReport};
pub use writer::{generate_bundle, BundleOptions};
