//! Version key types for migration ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error types for version operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {0:?}")]
    InvalidFormat(String),

    #[error("Version component {component:?} in {version:?} is not a non-negative integer")]
    InvalidComponent { version: String, component: String },
}

/// A migration version: an ordered tuple of non-negative integers.
///
/// Ordering is lexicographic over the integer components, so `1.10` sorts
/// after `1.9`. When one key is a prefix of the other, the shorter key sorts
/// first (`1.0` < `1.0.1`). The derived `Ord` on the inner `Vec` gives exactly
/// this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionKey(Vec<u32>);

impl VersionKey {
    /// Create a version key from its components.
    ///
    /// Returns `None` for an empty component list.
    pub fn new(components: Vec<u32>) -> Option<Self> {
        if components.is_empty() {
            None
        } else {
            Some(Self(components))
        }
    }

    /// Parse a version string such as `1_0_1`, `1.0.1` or `01.2_3`.
    ///
    /// `.` and `_` are interchangeable separators.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let components = s
            .split(['.', '_'])
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidComponent {
                        version: s.to_string(),
                        component: part.to_string(),
                    });
                }
                part.parse::<u32>().map_err(|_| VersionError::InvalidComponent {
                    version: s.to_string(),
                    component: part.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(components))
    }

    /// The integer components of this version.
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for VersionKey {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionKey {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionKey> for String {
    fn from(key: VersionKey) -> Self {
        key.to_string()
    }
}
