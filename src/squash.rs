//! Collapse pending migrations into a single file.
//!
//! Filesystem steps are not transactional: if a deletion fails after the first
//! file was rewritten, the directory is left half-squashed and must be
//! inspected before re-running.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{MigrationFile, list_local, validate_contiguous};
use crate::error::{MigrantError, Result};
use crate::pending::pending;
use crate::store::VersionStore;
use crate::version::Version;

/// What a squash did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    NothingPending,
    Squashed {
        /// The surviving file, named after the lowest pending version.
        into: PathBuf,
        /// Every pending file merged into `into`, in version order.
        merged: Vec<String>,
        /// Files deleted after the merge.
        removed: Vec<PathBuf>,
    },
}

/// Squash `dir` against the version recorded in `store`.
///
/// A missing tracking table is an error here: treating it as "nothing applied"
/// would fold the whole directory into its first file.
pub async fn squash_pending<S>(store: &mut S, dir: &Path) -> Result<SquashOutcome>
where
    S: VersionStore + ?Sized,
{
    let current = store.read_current_version().await?;
    let catalog = list_local(dir)?;
    squash(dir, current.as_ref(), &catalog)
}

/// Merge every migration pending after `current` into the first pending file
/// and delete the others. The version marker is not touched.
pub fn squash(
    dir: &Path,
    current: Option<&Version>,
    catalog: &[MigrationFile],
) -> Result<SquashOutcome> {
    validate_contiguous(catalog)?;
    let pending = pending(current, catalog);
    let Some(first) = pending.first() else {
        return Ok(SquashOutcome::NothingPending);
    };

    let combined = pending
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let into = dir.join(&first.filename);
    fs::write(&into, combined)
        .map_err(|e| MigrantError::io(&into, e))?;
    debug!(file = %into.display(), merged = pending.len(), "wrote squashed migration");

    let mut removed = Vec::new();
    for migration in pending.iter().skip(1) {
        let path = dir.join(&migration.filename);
        fs::remove_file(&path)
            .map_err(|e| MigrantError::io(&path, e))?;
        removed.push(path);
    }

    Ok(SquashOutcome::Squashed {
        into,
        merged: pending.iter().map(|m| m.filename.clone()).collect(),
        removed,
    })
}
