//! Local/remote catalog comparison.
//!
//! The remote catalog must be a positional prefix of the local one: entry `i`
//! on the remote side is compared with entry `i` locally. Extra local entries
//! after the remote ones are the branch's new migrations and are accepted.

use crate::catalog::{MigrationFile, validate_contiguous};
use crate::error::{MigrantError, Result, SyncProperty};

/// Check `local` against `remote`.
pub fn check(local: &[MigrationFile], remote: &[MigrationFile]) -> Result<()> {
    check_with(local, remote, |_| {})
}

/// Like [`check`], calling `on_remote` before each remote entry is compared.
pub fn check_with<F>(
    local: &[MigrationFile],
    remote: &[MigrationFile],
    mut on_remote: F,
) -> Result<()>
where
    F: FnMut(&MigrationFile),
{
    validate_contiguous(local)?;

    for (i, theirs) in remote.iter().enumerate() {
        on_remote(theirs);

        let mismatch = |file: &str, property| MigrantError::SyncMismatch {
            file: file.to_string(),
            property,
        };

        let Some(ours) = local.get(i) else {
            return Err(mismatch(&theirs.filename, SyncProperty::Presence));
        };
        if ours.filename != theirs.filename {
            return Err(mismatch(&theirs.filename, SyncProperty::Presence));
        }
        if ours.version != theirs.version {
            return Err(mismatch(&ours.filename, SyncProperty::Version));
        }
        if ours.content != theirs.content {
            return Err(mismatch(&ours.filename, SyncProperty::Content));
        }
    }
    Ok(())
}
