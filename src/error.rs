//! Error taxonomy for pgmigrant.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which property of a migration diverged between the local and remote catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncProperty {
    /// The file exists on one side only (or under another name at the same position).
    Presence,
    /// Same file name, different parsed version.
    Version,
    /// Same file name and version, different SQL text.
    Content,
}

impl fmt::Display for SyncProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncProperty::Presence => write!(f, "presence"),
            SyncProperty::Version => write!(f, "version"),
            SyncProperty::Content => write!(f, "content"),
        }
    }
}

/// Every failure the migration engine can report.
#[derive(Debug, Error)]
pub enum MigrantError {
    /// The `pgmigrant.current_version` table does not exist yet.
    #[error("version tracking table does not exist")]
    TrackingAbsent,

    #[error("invalid migration file name {file:?}: {reason}")]
    InvalidVersionFormat { file: String, reason: String },

    #[error("migration versions must increment by 1, but got {found} after {previous}")]
    VersionGap { previous: String, found: String },

    #[error("migration version {version} is used by both {first} and {second}")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("migration version {0} is the last 4-digit version, cannot allocate another")]
    VersionOverflow(String),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {file} differs between local and remote ({property})")]
    SyncMismatch { file: String, property: SyncProperty },

    #[error("{0}: aborted by operator")]
    AbortedByOperator(String),

    #[error("another pgmigrant run holds the migration lock on this database")]
    Locked,

    /// Local migrations exist that the database has not applied yet.
    #[error(
        "database is at version {current} but local migrations reach {latest}, apply them first"
    )]
    NotUpToDate { current: String, latest: String },

    #[error("shutdown requested, stopping before migration {0}")]
    Cancelled(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config: {0}")]
    Config(String),

    #[error("remote repository: {0}")]
    Remote(String),

    #[error("schema diff: {0}")]
    Diff(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MigrantError>;

impl MigrantError {
    /// Wrap a database error with what was being attempted.
    pub fn storage(context: impl Into<String>, source: sqlx::Error) -> Self {
        MigrantError::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MigrantError::Io {
            path: path.into(),
            source,
        }
    }
}
