//! Pending migration resolution.

use crate::catalog::MigrationFile;
use crate::version::Version;

/// Migrations whose version is greater than `current`, in ascending version order.
///
/// `None` means no migration has been applied yet, so everything is pending.
pub fn pending<'a>(
    current: Option<&Version>,
    catalog: &'a [MigrationFile],
) -> Vec<&'a MigrationFile> {
    let mut pending: Vec<&MigrationFile> = catalog
        .iter()
        .filter(|m| current.is_none_or(|cur| m.version > *cur))
        .collect();
    pending.sort_by(|a, b| a.version.cmp(&b.version));
    pending
}
