//! pgmigrant: ordered, versioned SQL migrations for Postgres.
//!
//! Migration files live in one directory as `NNNN[_description].sql`. The
//! database records the last applied version in `pgmigrant.current_version`;
//! every file with a greater version is pending and is applied in its own
//! transaction, together with the version update.
//!
//! # Example
//! ```no_run
//! use pgmigrant::prelude::*;
//! use std::path::Path;
//!
//! async fn migrate(url: &str) -> pgmigrant::Result<()> {
//!     let mut session = PgSession::connect(url).await?;
//!     let report = apply_pending(
//!         &mut session,
//!         Path::new("./migrations"),
//!         &AutoApprove,
//!         &Shutdown::new(),
//!         ApplyOptions::default(),
//!     )
//!     .await?;
//!     println!("applied {} migration(s)", report.applied.len());
//!     session.close().await
//! }
//! ```

pub mod applier;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod confirm;
pub mod differ;
pub mod error;
pub mod pending;
pub mod pg;
pub mod plan;
pub mod remote;
pub mod run;
pub mod shutdown;
pub mod squash;
pub mod store;
pub mod sync;
pub mod version;

pub use error::{MigrantError, Result, SyncProperty};
pub use version::Version;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::applier::Applier;
    pub use crate::catalog::{MigrationFile, list_local};
    pub use crate::confirm::{AutoApprove, Confirm, TerminalPrompt};
    pub use crate::error::{MigrantError, Result};
    pub use crate::pending::pending;
    pub use crate::pg::PgSession;
    pub use crate::run::{ApplyOptions, ApplyReport, apply_pending};
    pub use crate::shutdown::Shutdown;
    pub use crate::store::{VersionStore, read_or_init};
    pub use crate::version::Version;
}
