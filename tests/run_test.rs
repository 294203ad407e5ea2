//! Apply-sequence behaviour against an in-memory database.

mod common;

use std::path::Path;
use std::sync::Mutex;

use common::{Decline, FakeDb, migrations, versions};
use pgmigrant::confirm::{AutoApprove, Confirm};
use pgmigrant::run::{ApplyOptions, ApplyReport, apply_pending};
use pgmigrant::shutdown::Shutdown;
use pgmigrant::{MigrantError, Result};
use pretty_assertions::assert_eq;

/// Approves and requests shutdown after the first migration.
struct StopAfterFirst(Shutdown, Mutex<usize>);

impl Confirm for StopAfterFirst {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        let mut asked = self.1.lock().unwrap();
        *asked += 1;
        if *asked == 1 {
            self.0.request();
        }
        Ok(true)
    }
}

async fn apply_approved(db: &mut FakeDb, dir: &Path) -> Result<ApplyReport> {
    apply_pending(db, dir, &AutoApprove, &Shutdown::new(), ApplyOptions::default()).await
}

#[tokio::test]
async fn test_applies_pending_in_order() {
    let dir = tempfile::tempdir().unwrap();
    migrations(
        dir.path(),
        &[
            ("0003_c.sql", "SELECT 3;"),
            ("0001_a.sql", "SELECT 1;"),
            ("0002_b.sql", "SELECT 2;"),
        ],
    );

    let mut db = FakeDb::tracked_at(Some("0001"));
    let report = apply_approved(&mut db, dir.path()).await.unwrap();

    assert_eq!(versions(&report.applied), vec!["0002", "0003"]);
    assert_eq!(db.executed, vec!["SELECT 2;", "SELECT 3;"]);
    assert_eq!(db.current.unwrap().as_str(), "0003");
}

#[tokio::test]
async fn test_creates_tracking_on_first_run() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0000_init.sql", "CREATE TABLE a (id int);")]);

    let mut db = FakeDb::default();
    apply_approved(&mut db, dir.path()).await.unwrap();

    assert_eq!(db.tracking_created, 1);
    assert_eq!(db.current.unwrap().as_str(), "0000");
}

#[tokio::test]
async fn test_failure_stops_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    migrations(
        dir.path(),
        &[
            ("0001_a.sql", "SELECT 1;"),
            ("0002_b.sql", "SELECT 2;\n-- END STATEMENT --\nSELECT FAIL;"),
            ("0003_c.sql", "SELECT 3;"),
        ],
    );

    let mut db = FakeDb::tracked_at(None);
    let result = apply_approved(&mut db, dir.path()).await;
    assert!(result.is_err());
    assert_eq!(db.current.as_ref().unwrap().as_str(), "0001");
    assert_eq!(db.executed, vec!["SELECT 1;"]);

    migrations(dir.path(), &[("0002_b.sql", "SELECT 2;")]);
    let report = apply_approved(&mut db, dir.path()).await.unwrap();
    assert_eq!(versions(&report.applied), vec!["0002", "0003"]);
    assert_eq!(db.executed, vec!["SELECT 1;", "SELECT 2;", "SELECT 3;"]);
}

#[tokio::test]
async fn test_duplicate_versions_rejected_before_any_apply() {
    let dir = tempfile::tempdir().unwrap();
    migrations(
        dir.path(),
        &[
            ("0000_init.sql", "SELECT 0;"),
            ("0001_a.sql", "SELECT 1;"),
            ("0001_b.sql", "SELECT 2;"),
        ],
    );

    let mut db = FakeDb::tracked_at(None);
    let result = apply_approved(&mut db, dir.path()).await;

    match result {
        Err(MigrantError::DuplicateVersion { version, .. }) => assert_eq!(version, "0001"),
        other => panic!("expected DuplicateVersion, got {other:?}"),
    }
    assert!(db.executed.is_empty());
    assert!(db.current.is_none());
}

#[tokio::test]
async fn test_version_gap_rejected_before_any_apply() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0001_a.sql", "SELECT 1;"), ("0003_c.sql", "SELECT 3;")]);

    let mut db = FakeDb::tracked_at(None);
    let result = apply_approved(&mut db, dir.path()).await;

    assert!(matches!(result, Err(MigrantError::VersionGap { .. })));
    assert!(db.executed.is_empty());
    assert!(db.current.is_none());
}

#[tokio::test]
async fn test_dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0001_a.sql", "SELECT 1;"), ("0002_b.sql", "SELECT 2;")]);

    let mut db = FakeDb::tracked_at(None);
    let options = ApplyOptions { dry_run: true };
    let report = apply_pending(&mut db, dir.path(), &Decline, &Shutdown::new(), options)
        .await
        .unwrap();

    assert_eq!(versions(&report.previewed), vec!["0001", "0002"]);
    assert!(report.applied.is_empty());
    assert!(db.executed.is_empty());
    assert!(db.current.is_none());
}

#[tokio::test]
async fn test_decline_aborts() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0001_a.sql", "SELECT 1;")]);

    let mut db = FakeDb::tracked_at(None);
    let options = ApplyOptions::default();
    let result = apply_pending(&mut db, dir.path(), &Decline, &Shutdown::new(), options).await;

    assert!(matches!(result, Err(MigrantError::AbortedByOperator(_))));
    assert!(db.current.is_none());
}

#[tokio::test]
async fn test_shutdown_stops_between_migrations() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0001_a.sql", "SELECT 1;"), ("0002_b.sql", "SELECT 2;")]);

    let shutdown = Shutdown::new();
    let confirm = StopAfterFirst(shutdown.clone(), Mutex::new(0));
    let mut db = FakeDb::tracked_at(None);
    let options = ApplyOptions::default();
    let result = apply_pending(&mut db, dir.path(), &confirm, &shutdown, options).await;

    match result {
        Err(MigrantError::Cancelled(version)) => assert_eq!(version, "0002"),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(db.current.unwrap().as_str(), "0001");
}

#[tokio::test]
async fn test_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    migrations(dir.path(), &[("0001_a.sql", "SELECT 1;")]);

    let mut db = FakeDb::tracked_at(Some("0001"));
    let report = apply_approved(&mut db, dir.path()).await.unwrap();
    assert!(report.applied.is_empty());
    assert!(db.executed.is_empty());
}
