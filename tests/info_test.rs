mod common;

use common::create_test_project;
use waystone::config::{load_config, ConfigOverrides, RunMode};
use waystone::migration::{MigrationError, MigrationState, ScriptRegistry};

#[test]
fn test_info_reports_applied_pending_and_missing() {
    let project = create_test_project();
    project.write_migration("V1__create_users.sql", "CREATE TABLE users (id INTEGER);");
    project.write_migration("V2__create_posts.sql", "CREATE TABLE posts (id INTEGER);");
    project.migrator(ScriptRegistry::new()).run().unwrap();

    project.remove_migration("V1__create_users.sql");
    project.write_migration("V3__create_tags.sql", "CREATE TABLE tags (id INTEGER);");

    let statuses = project.migrator(ScriptRegistry::new()).info().unwrap();
    let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["V1__create_users.sql", "V2__create_posts.sql", "V3__create_tags.sql"]
    );

    assert_eq!(statuses[0].state, MigrationState::Missing);
    assert!(matches!(statuses[1].state, MigrationState::Applied { .. }));
    assert_eq!(statuses[2].state, MigrationState::Pending);
}

#[test]
fn test_info_on_fresh_database() {
    let project = create_test_project();
    project.write_migration("V1__create_users.sql", "CREATE TABLE users (id INTEGER);");

    let statuses = project.migrator(ScriptRegistry::new()).info().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, MigrationState::Pending);
    assert!(!project.table_exists("users"));
}

#[test]
fn test_validate_lists_verified_migrations() {
    let project = create_test_project();
    project.write_migration("V1__create_users.sql", "CREATE TABLE users (id INTEGER);");
    project.write_migration("V2__create_posts.sql", "CREATE TABLE posts (id INTEGER);");
    project.migrator(ScriptRegistry::new()).run().unwrap();

    let result = project.migrator(ScriptRegistry::new()).validate().unwrap();
    assert_eq!(
        result.verified,
        vec!["V1__create_users.sql", "V2__create_posts.sql"]
    );
}

#[test]
fn test_validate_detects_edited_file() {
    let project = create_test_project();
    project.write_migration("V1__create_users.sql", "CREATE TABLE users (id INTEGER);");
    project.migrator(ScriptRegistry::new()).run().unwrap();
    project.write_migration("V1__create_users.sql", "CREATE TABLE users (id TEXT);");

    let err = project.migrator(ScriptRegistry::new()).validate().unwrap_err();
    assert!(matches!(err, MigrationError::ChecksumMismatch { .. }));
}

#[test]
fn test_ledger_rows_carry_checksum_and_extension() {
    let project = create_test_project();
    project.write_migration("V01_01__create_users.sql", "CREATE TABLE users (id INTEGER);");
    project.migrator(ScriptRegistry::new()).run().unwrap();

    let expected = waystone::utils::compute_checksum(b"CREATE TABLE users (id INTEGER);");
    assert_eq!(project.column_values("SELECT checksum FROM waystone"), vec![expected]);
    assert_eq!(project.column_values("SELECT extension FROM waystone"), vec!["SQL"]);
    assert_eq!(project.column_values("SELECT version FROM waystone"), vec!["1.1"]);
}

#[test]
fn test_config_file_with_overrides() {
    let project = create_test_project();
    let config_path = project.temp_dir.path().join(".waystone.json");
    std::fs::write(
        &config_path,
        r#"{"migrationDir": "sql", "databaseName": "app.db", "databaseTable": "history"}"#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        database_table: Some("ledger".to_string()),
        run_mode: Some(RunMode::Cooperative),
        ..Default::default()
    };
    let config = load_config(&config_path, overrides).unwrap();

    assert_eq!(config.migration_dir, std::path::PathBuf::from("sql"));
    assert_eq!(config.database_name.as_deref(), Some("app.db"));
    assert_eq!(config.database_table, "ledger");
    assert_eq!(config.run_mode, RunMode::Cooperative);
    assert!(config.validate_checksums);
}
