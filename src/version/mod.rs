//! Version handling for migration identifiers.
//!
//! Migration versions are variable-arity tuples of small integers written
//! with `.` or `_` separators in file names (`V1_0_1__...`) and stored in
//! canonical dotted form (`1.0.1`) in the ledger.

mod types;

pub use types::{VersionError, VersionKey};

use std::cmp::Ordering;

/// Parse a version string into a key.
pub fn parse_version(s: &str) -> Result<VersionKey, VersionError> {
    VersionKey::parse(s)
}

/// Compare two versions component-wise.
///
/// Shared prefix components decide first; if one key is a prefix of the
/// other the shorter one is smaller.
pub fn compare_versions(a: &VersionKey, b: &VersionKey) -> Ordering {
    a.cmp(b)
}

/// Canonical dotted representation of a version, used for display and as
/// the ledger key.
pub fn format_version(key: &VersionKey) -> String {
    key.to_string()
}

/// Normalize a raw version string to its canonical dotted form.
pub fn normalize_version(s: &str) -> Result<String, VersionError> {
    Ok(format_version(&parse_version(s)?))
}
