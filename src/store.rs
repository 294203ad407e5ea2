//! Version marker storage.
//!
//! The database owns the single "current version" row in
//! `pgmigrant.current_version`; nothing is cached between invocations.

use async_trait::async_trait;
use tracing::info;

use crate::error::{MigrantError, Result};
use crate::version::Version;

/// Schema holding the tracking table. Excluded from schema diffs.
pub const TRACKING_SCHEMA: &str = "pgmigrant";

/// Fully qualified tracking table.
pub const TRACKING_TABLE: &str = "pgmigrant.current_version";

/// Read and manage the current version marker.
///
/// Writing the marker is not part of this trait: it only ever happens inside
/// the transaction that applies a migration (see [`crate::applier::Applier`]).
#[async_trait]
pub trait VersionStore: Send {
    /// Create the tracking schema and table if they are missing.
    async fn ensure_tracking_exists(&mut self) -> Result<()>;

    /// The current version, `None` when the table exists but holds no row.
    ///
    /// Fails with [`MigrantError::TrackingAbsent`] when the table does not exist.
    async fn read_current_version(&mut self) -> Result<Option<Version>>;

    /// Drop the tracking schema and the default `public` schema, then
    /// recreate an empty `public`. Callers must confirm beforehand.
    async fn drop_tracking(&mut self) -> Result<()>;
}

/// Read the current version, creating the tracking table on first use.
pub async fn read_or_init<S>(store: &mut S) -> Result<Option<Version>>
where
    S: VersionStore + ?Sized,
{
    match store.read_current_version().await {
        Err(MigrantError::TrackingAbsent) => {
            info!("version tracking table missing, creating it");
            store.ensure_tracking_exists().await?;
            store.read_current_version().await
        }
        other => other,
    }
}
