use clap::{Parser, Subcommand};
use pact_auditor::bundle::manifest::BundleView;
use pact_auditor::bundle::{generate_bundle, pack_dir, verify_bundle_dir, verify_zip, BundleOptions};
use pact_auditor::canonical::{canonical_json_string, to_canonical_value};
use pact_auditor::config::Config;
use pact_auditor::crypto::Sha256Provider;
use pact_auditor::logger::Logger;
use pact_auditor::dbl::judgment::JudgmentArtifact;
use pact_auditor::dbl::resolve;
use pact_auditor::error::{Error, Result};
use pact_auditor::report::contention::scan_dir;
use pact_auditor::report::gc_view::render_gc_view;
use pact_auditor::report::insurer::summarize;
use pact_auditor::report::passport::recompute_passports;
use pact_auditor::signer::Keypair;
use pact_auditor::transcript::replay::{replay, IntegrityStatus, ReplayErrorType};
use pact_auditor::transcript::types::{FailureEvent, RoundType, Terminality, Transcript};
use pact_auditor::transcript::TranscriptBuilder;
use pact_auditor::{constitution, current_timestamp_ms};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pact-auditor")]
#[command(about = "Verifier and blame-resolver for signed negotiation transcripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a transcript: verify the signed chain and report integrity
    Replay {
        /// Transcript JSON file
        transcript: PathBuf,

        /// Exit 0 on PARTIAL results whose only finding is a container
        /// hash mismatch
        #[arg(long)]
        allow_compromised: bool,
    },

    /// Resolve blame for a transcript and emit the judgment artifact
    Judge {
        transcript: PathBuf,

        /// Also write the judgment JSON to a file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write a reviewer narrative to stderr (stdout stays pure JSON)
        #[arg(long)]
        human: bool,
    },

    /// Emit the reviewer-facing GC view
    GcView {
        transcript: PathBuf,
    },

    /// Emit the insurer coverage summary
    InsurerSummary {
        transcript: PathBuf,
    },

    /// Scan a directory of transcripts for double commits
    ContentionScan {
        #[arg(long)]
        transcripts_dir: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate an evidence bundle directory
    EvidenceBundle {
        transcript: PathBuf,

        #[arg(long)]
        out: PathBuf,

        /// Bundle view: internal, partner, or auditor
        #[arg(long, default_value = "internal")]
        view: String,
    },

    /// Verify an evidence bundle (directory or manifest path)
    EvidenceVerify {
        bundle: PathBuf,
    },

    /// Generate an auditor bundle and pack it into a ZIP
    AuditorPack {
        transcript: PathBuf,

        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "auditor")]
        view: String,
    },

    /// Verify a packed auditor ZIP
    AuditorPackVerify {
        #[arg(long)]
        zip: PathBuf,

        /// Treat a non-standard constitution as non-fatal
        #[arg(long)]
        allow_nonstandard: bool,
    },

    /// Recompute the per-signer passport registry from transcript dirs
    PassportRecompute {
        /// One or more transcript directories, merged in order
        #[arg(long, required = true)]
        transcripts_dir: Vec<PathBuf>,

        /// Restrict the registry to a single signer (Base58 public key)
        #[arg(long)]
        signer: Option<String>,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate an Ed25519 keypair file for signing fixtures
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },

    /// Emit a freshly signed demo transcript
    DemoTranscript {
        /// Scenario: happy, settlement-timeout, or policy-abort
        #[arg(long, default_value = "happy")]
        scenario: String,

        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Print exactly the canonical artifact JSON to stdout.
fn emit<T: Serialize>(artifact: &T) -> Result<()> {
    let value = to_canonical_value(artifact)?;
    println!("{}", canonical_json_string(&value)?);
    Ok(())
}

fn emit_and_maybe_write<T: Serialize>(artifact: &T, out: Option<&Path>) -> Result<()> {
    if let Some(path) = out {
        let value = to_canonical_value(artifact)?;
        write_atomic(path, canonical_json_string(&value)?.as_bytes())?;
    }
    emit(artifact)
}

/// Write via a sibling temp file and rename so no partial artifact is
/// ever observable.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| Error::Io(format!("Failed to rename {}: {}", path.display(), e)))
}

fn human_narrative(judgment: &JudgmentArtifact) {
    eprintln!("-- judgment narrative --");
    eprintln!(
        "determination: {:?} (confidence {})",
        judgment.dbl_determination, judgment.confidence
    );
    eprintln!("last valid round: {}", judgment.last_valid_round);
    if let Some(hash) = &judgment.last_valid_hash {
        eprintln!("last valid hash:  {}", hash);
    }
    eprintln!(
        "next: {} -> {}",
        judgment.required_next_actor.as_str(),
        judgment.required_action
    );
    eprintln!("{}", judgment.recommendation);
    if let Some(notes) = &judgment.notes {
        eprintln!("notes: {}", notes);
    }
}

fn demo_transcript(scenario: &str) -> Result<Transcript> {
    let buyer = Keypair::generate();
    let provider = Keypair::generate();
    let created_at_ms = 1_000_000_000_000;
    let mut b = TranscriptBuilder::new(
        &format!("demo-{}", scenario),
        &format!("intent-demo-{}", scenario),
        "purchase",
        created_at_ms,
    );
    b.add_round(
        RoundType::Intent,
        &json!({"protocol_version": "4.0", "type": "INTENT", "scope": "compute"}),
        &buyer,
        "buyer-agent",
        created_at_ms + 1,
    )?;
    match scenario {
        "happy" => {
            b.add_round(
                RoundType::Ask,
                &json!({"protocol_version": "4.0", "type": "ASK", "price": 40}),
                &provider,
                "provider-agent",
                created_at_ms + 2,
            )?;
            b.add_round(
                RoundType::Accept,
                &json!({"protocol_version": "4.0", "type": "ACCEPT"}),
                &buyer,
                "buyer-agent",
                created_at_ms + 3,
            )?;
            b.build_with_final_hash()
        }
        "settlement-timeout" => {
            b.add_round(
                RoundType::Ask,
                &json!({"protocol_version": "4.0", "type": "ASK", "price": 40}),
                &provider,
                "provider-agent",
                created_at_ms + 2,
            )?;
            b.add_round(
                RoundType::Accept,
                &json!({"protocol_version": "4.0", "type": "ACCEPT"}),
                &buyer,
                "buyer-agent",
                created_at_ms + 3,
            )?;
            b.failure_event(FailureEvent {
                code: "PACT-404".to_string(),
                stage: "settlement".to_string(),
                fault_domain: "provider".to_string(),
                terminality: Terminality::NonTerminal,
                evidence_refs: vec![],
                timestamp: created_at_ms + 10_000,
                transcript_hash: String::new(),
            })
            .build_with_final_hash()
        }
        "policy-abort" => b
            .failure_event(FailureEvent {
                code: "PACT-101".to_string(),
                stage: "policy".to_string(),
                fault_domain: "buyer".to_string(),
                terminality: Terminality::Terminal,
                evidence_refs: vec![],
                timestamp: created_at_ms + 100,
                transcript_hash: String::new(),
            })
            .build_with_final_hash(),
        other => Err(Error::UnknownVariant(format!("demo scenario {:?}", other))),
    }
}

pub fn run(cli: Cli) -> Result<i32> {
    let hasher = Sha256Provider;
    let mut config = Config::from_env();

    match cli.command {
        Commands::Replay {
            transcript,
            allow_compromised,
        } => {
            config.set_allow_compromised(allow_compromised);
            let t = Transcript::from_file(&transcript)?;
            let result = replay(&t, &hasher)?;
            for warning in &result.warnings {
                Logger::warn(warning);
            }
            emit(&result)?;
            let pass = match result.integrity_status {
                IntegrityStatus::Valid => true,
                IntegrityStatus::Partial => {
                    config.allow_compromised
                        && result
                            .errors
                            .iter()
                            .all(|e| e.error_type == ReplayErrorType::FinalHashMismatch)
                }
                _ => false,
            };
            Ok(if pass { 0 } else { 1 })
        }

        Commands::Judge {
            transcript,
            out,
            human,
        } => {
            let t = Transcript::from_file(&transcript)?;
            let result = replay(&t, &hasher)?;
            let judgment = resolve(&t, &result)?;
            if human {
                human_narrative(&judgment);
            }
            emit_and_maybe_write(&judgment, out.as_deref())?;
            Ok(0)
        }

        Commands::GcView { transcript } => {
            let t = Transcript::from_file(&transcript)?;
            let result = replay(&t, &hasher)?;
            let judgment = resolve(&t, &result)?;
            let view = render_gc_view(
                &t,
                &result,
                &judgment,
                &constitution::default_constitution_hash(),
            );
            emit(&view)?;
            Ok(0)
        }

        Commands::InsurerSummary { transcript } => {
            let t = Transcript::from_file(&transcript)?;
            let result = replay(&t, &hasher)?;
            let judgment = resolve(&t, &result)?;
            let summary = summarize(&t, &result, &judgment, false);
            emit(&summary)?;
            Ok(0)
        }

        Commands::ContentionScan {
            transcripts_dir,
            out,
        } => {
            let report = scan_dir(&transcripts_dir, &hasher)?;
            emit_and_maybe_write(&report, out.as_deref())?;
            Ok(0)
        }

        Commands::EvidenceBundle {
            transcript,
            out,
            view,
        } => {
            let t = Transcript::from_file(&transcript)?;
            let view: BundleView = view.parse()?;
            let opts = BundleOptions::new(view, current_timestamp_ms());
            let manifest = generate_bundle(&t, &out, &opts, &hasher)?;
            Logger::info(&format!(
                "wrote {} bundle {} to {}",
                view.as_str(),
                manifest.bundle_id,
                out.display()
            ));
            emit(&manifest)?;
            Ok(0)
        }

        Commands::EvidenceVerify { bundle } => {
            let report = verify_bundle_dir(&bundle, false, &hasher)?;
            let ok = report.ok;
            emit(&report)?;
            Ok(if ok { 0 } else { 1 })
        }

        Commands::AuditorPack {
            transcript,
            out,
            view,
        } => {
            let t = Transcript::from_file(&transcript)?;
            let view: BundleView = view.parse()?;
            let opts = BundleOptions::new(view, current_timestamp_ms());
            let staging = tempfile::tempdir()
                .map_err(|e| Error::Io(format!("Failed to create staging dir: {}", e)))?;
            let manifest = generate_bundle(&t, staging.path(), &opts, &hasher)?;
            pack_dir(staging.path(), &out)?;
            emit(&manifest)?;
            Ok(0)
        }

        Commands::AuditorPackVerify {
            zip,
            allow_nonstandard,
        } => {
            config.set_allow_nonstandard(allow_nonstandard);
            let report = verify_zip(&zip, config.allow_nonstandard, &hasher)?;
            for mismatch in &report.mismatches {
                Logger::warn(mismatch);
            }
            let ok = report.ok;
            emit(&report)?;
            Ok(if ok { 0 } else { 1 })
        }

        Commands::PassportRecompute {
            transcripts_dir,
            signer,
            out,
        } => {
            let registry = recompute_passports(&transcripts_dir, signer.as_deref(), &hasher)?;
            emit_and_maybe_write(&registry, out.as_deref())?;
            Ok(0)
        }

        Commands::Keygen { out } => {
            let keypair = Keypair::generate();
            keypair.save_to_file(&out)?;
            emit(&json!({"public_key_b58": keypair.public_key_b58()}))?;
            Ok(0)
        }

        Commands::DemoTranscript { scenario, out } => {
            let t = demo_transcript(&scenario)?;
            emit_and_maybe_write(&t, out.as_deref())?;
            Ok(0)
        }
    }
}
