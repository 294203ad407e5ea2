//! Transactional application of a single migration.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::version::Version;

/// Separates statements that must be executed one at a time within the same
/// migration transaction.
pub const STATEMENT_END_MARKER: &str = "-- END STATEMENT --";

/// Session-level safety limits set before any migration SQL runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub statement: Duration,
    pub lock: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            statement: Duration::from_secs(90),
            lock: Duration::from_secs(60),
        }
    }
}

impl SessionTimeouts {
    /// `SET SESSION` commands for these limits, in execution order.
    pub fn set_statements(&self) -> [String; 2] {
        [
            format!("SET SESSION statement_timeout = {}", self.statement.as_millis()),
            format!("SET SESSION lock_timeout = {}", self.lock.as_millis()),
        ]
    }
}

/// Applies one migration and advances the version marker atomically.
#[async_trait]
pub trait Applier: Send {
    /// Run `sql` and record `version` in one transaction. On any failure the
    /// transaction is rolled back and the marker keeps its previous value.
    ///
    /// Returns the wall-clock time the migration took.
    async fn apply(&mut self, version: &Version, sql: &str) -> Result<Duration>;
}

/// Split migration content on [`STATEMENT_END_MARKER`], in file order.
///
/// Never splits on `;`: semicolons may appear inside literals, comments and
/// quoted identifiers. Whitespace-only fragments are dropped.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(STATEMENT_END_MARKER)
        .filter(|fragment| !fragment.trim().is_empty())
        .collect()
}
