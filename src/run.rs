//! Apply-sequence orchestration.
//!
//! Pending migrations are recomputed from the live version marker on every
//! run and applied one at a time in ascending version order. The first failure
//! stops the sequence; everything committed before it stays applied and the
//! rest remains pending for the next run.

use std::path::Path;

use colored::*;
use tracing::info;

use crate::applier::Applier;
use crate::catalog::{list_local, validate_contiguous};
use crate::confirm::{Confirm, require};
use crate::error::{MigrantError, Result};
use crate::pending::pending;
use crate::shutdown::Shutdown;
use crate::store::{VersionStore, read_or_init};
use crate::version::Version;

/// How to run the sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Print every pending migration without executing anything.
    pub dry_run: bool,
}

/// Migrations handled by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Versions committed by this run, in order.
    pub applied: Vec<Version>,
    /// Versions printed but not executed (dry run).
    pub previewed: Vec<Version>,
}

/// Apply every migration in `dir` newer than the database's current version.
pub async fn apply_pending<T>(
    target: &mut T,
    dir: &Path,
    confirm: &dyn Confirm,
    shutdown: &Shutdown,
    options: ApplyOptions,
) -> Result<ApplyReport>
where
    T: VersionStore + Applier + ?Sized,
{
    let current = read_or_init(target).await?;
    let catalog = list_local(dir)?;
    validate_contiguous(&catalog)?;
    let pending = pending(current.as_ref(), &catalog);

    let mut report = ApplyReport::default();
    if pending.is_empty() {
        println!("{}", "No pending migrations".green());
        return Ok(report);
    }

    let total = pending.len();
    for (i, migration) in pending.into_iter().enumerate() {
        if shutdown.is_requested() {
            return Err(MigrantError::Cancelled(migration.version.to_string()));
        }

        println!(
            "{} {} as {} of {} migrations:",
            "Migration".cyan(),
            migration.version.to_string().yellow(),
            i + 1,
            total
        );
        println!("\n---\n");
        println!("{}", migration.content);
        println!("---\n");

        if options.dry_run {
            report.previewed.push(migration.version.clone());
            continue;
        }

        require(confirm, "Apply this migration?")?;
        let elapsed = target.apply(&migration.version, &migration.content).await?;
        info!(version = %migration.version, file = %migration.filename, "applied");
        println!(
            "\n{} Finished executing {}. Duration: {:?}\n",
            "✓".green(),
            migration.filename,
            elapsed
        );
        report.applied.push(migration.version.clone());
    }

    Ok(report)
}
