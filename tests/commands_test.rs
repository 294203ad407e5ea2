//! Command cores driven against the in-memory database.

mod common;

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use common::{Decline, FakeDb, file_names, migrations};
use pgmigrant::commands::{
    DiffOptions, DiffOutcome, clean_with, diff_with, ensure_clean_allowed, pending_versions,
};
use pgmigrant::config::Config;
use pgmigrant::confirm::AutoApprove;
use pgmigrant::differ::{DiffRequest, SchemaDiffer};
use pgmigrant::plan::{MigrationPlan, PlannedStatement};
use pgmigrant::{MigrantError, Result};
use pretty_assertions::assert_eq;

/// Returns the same plan for every request.
struct FixedPlan(MigrationPlan);

#[async_trait]
impl SchemaDiffer for FixedPlan {
    async fn plan(&self, request: &DiffRequest) -> Result<MigrationPlan> {
        assert!(request.exclude_schemas.iter().any(|s| s == "pgmigrant"));
        Ok(self.0.clone())
    }
}

fn add_table() -> FixedPlan {
    FixedPlan(MigrationPlan {
        statements: vec![PlannedStatement::new("CREATE TABLE t (id int)")],
    })
}

/// A config pointing at `root/migrations` with one declared schema file.
fn config_in(root: &Path) -> Config {
    let migration_dir = root.join("migrations");
    fs::create_dir_all(&migration_dir).unwrap();
    let schema = root.join("schema.sql");
    fs::write(&schema, "CREATE TABLE t (id int);").unwrap();

    Config {
        env_name: "test".to_string(),
        db_url: "postgres://localhost/app".to_string(),
        migration_dir,
        schema_files: vec![schema],
        exclude_schemas: Vec::new(),
        allow_db_clean: false,
        diff_command: vec!["pg-schema-diff-json".to_string()],
        github: None,
    }
}

#[test]
fn test_clean_refused_unless_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());

    let err = ensure_clean_allowed(&config).unwrap_err();
    assert!(err.to_string().contains("allow_db_clean=false"));

    config.allow_db_clean = true;
    ensure_clean_allowed(&config).unwrap();
}

#[tokio::test]
async fn test_clean_declined_keeps_tracking() {
    let mut db = FakeDb::tracked_at(Some("0003"));
    let result = clean_with(&mut db, &Decline).await;

    assert!(matches!(result, Err(MigrantError::AbortedByOperator(_))));
    assert!(db.tracking);
    assert_eq!(db.current.unwrap().as_str(), "0003");
}

#[tokio::test]
async fn test_clean_approved_drops_tracking() {
    let mut db = FakeDb::tracked_at(Some("0003"));
    clean_with(&mut db, &AutoApprove).await.unwrap();

    assert!(!db.tracking);
    assert!(db.current.is_none());
}

#[tokio::test]
async fn test_pending_versions_creates_tracking() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0000_init.sql", "SELECT 0;"), ("0001_a.sql", "SELECT 1;")]);

    let mut db = FakeDb::default();
    let versions = pending_versions(&mut db, dir.path()).await.unwrap();

    assert_eq!(db.tracking_created, 1);
    let versions: Vec<_> = versions.iter().map(|v| v.as_str()).collect();
    assert_eq!(versions, vec!["0000", "0001"]);
}

#[tokio::test]
async fn test_pending_versions_rejects_gap() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0000_init.sql", "SELECT 0;"), ("0002_b.sql", "SELECT 2;")]);

    let mut db = FakeDb::tracked_at(None);
    let result = pending_versions(&mut db, dir.path()).await;

    assert!(matches!(result, Err(MigrantError::VersionGap { .. })));
}

#[tokio::test]
async fn test_diff_writes_first_migration() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let mut db = FakeDb::default();
    let options = DiffOptions {
        migrate: false,
        name: Some("add t".to_string()),
    };
    let outcome = diff_with(&mut db, &config, &add_table(), &AutoApprove, &options)
        .await
        .unwrap();

    let path = config.migration_dir.join("0000_add_t.sql");
    assert_eq!(
        outcome,
        DiffOutcome::Created {
            path: path.clone(),
            applied: None,
        }
    );
    assert_eq!(db.tracking_created, 1);
    assert!(db.executed.is_empty());
    assert!(fs::read_to_string(path).unwrap().starts_with("CREATE TABLE t (id int);"));
}

#[tokio::test]
async fn test_diff_declined_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let mut db = FakeDb::tracked_at(None);
    let options = DiffOptions::default();
    let result = diff_with(&mut db, &config, &add_table(), &Decline, &options).await;

    assert!(matches!(result, Err(MigrantError::AbortedByOperator(_))));
    assert!(file_names(&config.migration_dir).is_empty());
}

#[tokio::test]
async fn test_diff_empty_plan_matches() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let mut db = FakeDb::tracked_at(None);
    let differ = FixedPlan(MigrationPlan::default());
    let options = DiffOptions::default();
    let outcome = diff_with(&mut db, &config, &differ, &AutoApprove, &options)
        .await
        .unwrap();

    assert_eq!(outcome, DiffOutcome::SchemaMatches);
    assert!(file_names(&config.migration_dir).is_empty());
}

#[tokio::test]
async fn test_diff_migrate_refused_when_behind() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    migrations(
        &config.migration_dir,
        &[("0000_init.sql", "SELECT 0;"), ("0001_a.sql", "SELECT 1;")],
    );

    let mut db = FakeDb::tracked_at(Some("0000"));
    let options = DiffOptions {
        migrate: true,
        name: None,
    };
    let result = diff_with(&mut db, &config, &add_table(), &AutoApprove, &options).await;

    match result {
        Err(MigrantError::NotUpToDate { current, latest }) => {
            assert_eq!(current, "0000");
            assert_eq!(latest, "0001");
        }
        other => panic!("expected NotUpToDate, got {other:?}"),
    }
    assert!(db.executed.is_empty());
    assert_eq!(file_names(&config.migration_dir), vec!["0000_init.sql", "0001_a.sql"]);
}

#[tokio::test]
async fn test_diff_migrate_writes_then_applies() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    migrations(
        &config.migration_dir,
        &[("0000_init.sql", "SELECT 0;"), ("0001_a.sql", "SELECT 1;")],
    );

    let mut db = FakeDb::tracked_at(Some("0001"));
    let options = DiffOptions {
        migrate: true,
        name: None,
    };
    let outcome = diff_with(&mut db, &config, &add_table(), &AutoApprove, &options)
        .await
        .unwrap();

    match outcome {
        DiffOutcome::Created { path, applied } => {
            assert_eq!(path, config.migration_dir.join("0002.sql"));
            assert_eq!(applied.unwrap().as_str(), "0002");
        }
        other => panic!("expected Created, got {other:?}"),
    }
    assert_eq!(db.current.unwrap().as_str(), "0002");
    assert_eq!(db.executed.len(), 1);
    assert!(db.executed[0].starts_with("CREATE TABLE t (id int);"));
    assert_eq!(
        file_names(&config.migration_dir),
        vec!["0000_init.sql", "0001_a.sql", "0002.sql"]
    );
}

#[tokio::test]
async fn test_diff_without_schema_files_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.schema_files.clear();

    let mut db = FakeDb::tracked_at(None);
    let options = DiffOptions::default();
    let result = diff_with(&mut db, &config, &add_table(), &AutoApprove, &options).await;

    assert!(matches!(result, Err(MigrantError::Config(_))));
    assert_eq!(db.tracking_created, 0);
}
