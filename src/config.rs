use std::env;
use std::path::PathBuf;

/// Tool version stamped into verification reports.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the pact-auditor CLI tool
///
/// Single-threaded config for one invocation. Verification outcomes are a
/// pure function of the inputs; the flags here only widen what counts as
/// an acceptable outcome, they never change computed hashes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output directory for generated artifacts (default: current directory)
    pub out_dir: PathBuf,

    /// Accept PARTIAL replay results when only the container hash mismatches
    pub allow_compromised: bool,

    /// Accept constitutions whose hash is not in the accepted registry
    pub allow_nonstandard: bool,

    /// Log level: "info", "debug", "warn", "error" (default: "info")
    pub log_level: String,
}

impl Config {
    pub fn new() -> Self {
        let out_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Config {
            out_dir,
            allow_compromised: false,
            allow_nonstandard: false,
            log_level: "info".to_string(),
        }
    }

    pub fn set_out_dir(&mut self, dir: PathBuf) {
        self.out_dir = dir;
    }

    pub fn set_allow_compromised(&mut self, allow: bool) {
        self.allow_compromised = allow;
    }

    pub fn set_allow_nonstandard(&mut self, allow: bool) {
        self.allow_nonstandard = allow;
    }

    /// Load config from environment variables
    ///
    /// - `PACT_AUDITOR_LOG_LEVEL`: log level
    ///
    /// No environment variable affects verification outcomes.
    pub fn from_env() -> Self {
        let mut config = Config::new();
        if let Ok(level) = env::var("PACT_AUDITOR_LOG_LEVEL") {
            config.log_level = level;
        }
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
