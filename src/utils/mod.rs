mod hash;

pub use hash::{compute_checksum, compute_file_checksum};

/// Default migration directory, relative to the working directory
pub const DEFAULT_MIGRATION_DIR: &str = "resources";

/// Default name of the ledger table
pub const DEFAULT_LEDGER_TABLE: &str = "waystone";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".waystone.json";

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
