//! Migration file name grammar.
//!
//! A migration file is named `V<version>__<description>.<ext>`:
//! - `version` is one or more groups of 1-2 digits separated by `.` or `_`
//! - `description` is one or more `[A-Za-z0-9_]+` groups joined by `__`
//! - `ext` is `sql` or `py`, matched case-insensitively

use super::types::{Migration, MigrationError, MigrationKind};
use crate::version::VersionKey;
use once_cell::sync::Lazy;
use regex::Regex;

/// Literal that starts every migration file name.
pub const MIGRATION_PREFIX: &str = "V";

/// Literal between the version and the description.
pub const MIGRATION_SEPARATOR: &str = "__";

static FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{prefix}([0-9]{{1,2}}(?:[._][0-9]{{1,2}})*){sep}([A-Za-z0-9_]+(?:{sep}[A-Za-z0-9_]+)*)\.((?i:sql|py))$",
        prefix = regex::escape(MIGRATION_PREFIX),
        sep = regex::escape(MIGRATION_SEPARATOR),
    ))
    .expect("migration file name pattern is valid")
});

/// The pieces of a valid migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub version: VersionKey,
    pub description: String,
    pub extension: String,
    pub kind: MigrationKind,
}

/// Human-readable form of the grammar, used in error messages.
pub fn expected_pattern() -> String {
    format!(
        "{}{{version}}{}{{description}}[.sql|.py]",
        MIGRATION_PREFIX, MIGRATION_SEPARATOR
    )
}

/// Check a file name against the grammar without building a descriptor.
pub fn is_file_name_valid(name: &str) -> bool {
    FILE_NAME.is_match(name)
}

/// Validate and decompose a migration file name.
pub fn parse_file_name(name: &str) -> Result<ParsedName, MigrationError> {
    let invalid = || MigrationError::InvalidName {
        name: name.to_string(),
        expected: expected_pattern(),
    };

    let caps = FILE_NAME.captures(name).ok_or_else(invalid)?;
    let version = VersionKey::parse(&caps[1])?;
    let extension = caps[3].to_string();
    let kind = MigrationKind::from_extension(&extension).ok_or_else(invalid)?;

    Ok(ParsedName {
        version,
        description: caps[2].to_string(),
        extension,
        kind,
    })
}

/// Build a pending migration descriptor from a file name.
pub fn migration_from_name(name: &str) -> Result<Migration, MigrationError> {
    let parsed = parse_file_name(name)?;
    Ok(Migration::new(
        parsed.version,
        name.to_string(),
        parsed.description,
        parsed.kind,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in [
            "V1__t.sql",
            "V1_0_1__t.py",
            "V1.0.1__t.SQL",
            "V1_1__test1.sql",
            "V01_05__python_migration.py",
            "V2.1_3__seed__more.Py",
            "V99_99__x.sql",
        ] {
            assert!(is_file_name_valid(name), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "V1_0_100__t.sql",
            "V__t.sql",
            "1_1__t.sql",
            "V1_1__t.txt",
            "",
            "V1_1__my table.sql",
            " V1__t.sql",
            "V1__t.sql ",
            "V1_1_t.sql",
            "V1__.sql",
            "V100__t.sql",
            "V1__t",
            "V1__t-x.sql",
            "V\u{0661}__t.sql",
        ] {
            assert!(!is_file_name_valid(name), "{:?} should be invalid", name);
        }
    }

    #[test]
    fn test_parse_components() {
        let parsed = parse_file_name("V1_0_1__add_users.py").unwrap();
        assert_eq!(parsed.version.to_string(), "1.0.1");
        assert_eq!(parsed.description, "add_users");
        assert_eq!(parsed.extension, "py");
        assert_eq!(parsed.kind, MigrationKind::Procedural);
    }

    #[test]
    fn test_parse_uppercase_extension() {
        let parsed = parse_file_name("V2.1__seed.SQL").unwrap();
        assert_eq!(parsed.kind, MigrationKind::Statement);
        assert_eq!(parsed.version.components(), &[2, 1]);
    }

    #[test]
    fn test_parse_invalid_carries_name() {
        let err = parse_file_name("init.sql").unwrap_err();
        match err {
            MigrationError::InvalidName { name, expected } => {
                assert_eq!(name, "init.sql");
                assert_eq!(expected, "V{version}__{description}[.sql|.py]");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_ascii_digits_are_invalid_names() {
        let err = parse_file_name("V\u{0661}__t.sql").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }));
    }

    #[test]
    fn test_migration_from_name() {
        let m = migration_from_name("V01_02__test2.sql").unwrap();
        assert_eq!(m.name(), "V01_02__test2.sql");
        assert_eq!(m.version().to_string(), "1.2");
        assert!(m.checksum().is_none());
        assert!(m.apply_timestamp().is_none());
    }
}
