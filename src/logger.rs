/// Simple logger for pact-auditor.
///
/// Every level writes to stderr: stdout is reserved for artifact JSON,
/// so command output stays safe to pipe into a JSON processor.
pub struct Logger;

impl Logger {
    pub fn info(msg: &str) {
        eprintln!("[INFO] {}", msg);
    }

    pub fn debug(msg: &str) {
        eprintln!("[DEBUG] {}", msg);
    }

    pub fn warn(msg: &str) {
        eprintln!("[WARN] {}", msg);
    }

    pub fn error(msg: &str) {
        eprintln!("[ERROR] {}", msg);
    }
}
