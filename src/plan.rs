//! Migration plans produced by a schema diff, and their rendering into a
//! migration file the applier can execute.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::applier::STATEMENT_END_MARKER;
use crate::catalog::{self, MigrationFile};
use crate::error::{MigrantError, Result};
use crate::version::Version;

/// A risk attached to a generated statement (locking, data loss, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hazard {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// One DDL statement, without its terminating `;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStatement {
    pub ddl: String,
    #[serde(default)]
    pub hazards: Vec<Hazard>,
}

/// Ordered statements turning the live schema into the declared one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    #[serde(default)]
    pub statements: Vec<PlannedStatement>,
}

impl Hazard {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl PlannedStatement {
    pub fn new(ddl: impl Into<String>) -> Self {
        Self {
            ddl: ddl.into(),
            hazards: Vec::new(),
        }
    }

    pub fn hazard(mut self, hazard: Hazard) -> Self {
        self.hazards.push(hazard);
        self
    }
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render as migration file content: `<ddl>;` plus one hazard comment per
    /// hazard, statements separated by the statement-end marker.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let separator = format!("\n{}\n\n", STATEMENT_END_MARKER);
        let mut out = self
            .statements
            .iter()
            .map(render_statement)
            .collect::<Vec<_>>()
            .join(&separator);
        out.push('\n');
        out
    }
}

const CONCURRENT_INDEX_PREFIXES: [&str; 2] = ["CREATE INDEX", "CREATE UNIQUE INDEX"];

/// Rewrite `CREATE [UNIQUE] INDEX CONCURRENTLY` to the plain form.
///
/// Concurrent builds cannot run inside a transaction block, and every
/// migration runs inside one.
pub fn normalize_ddl(ddl: &str) -> String {
    for prefix in CONCURRENT_INDEX_PREFIXES {
        let concurrent = format!("{} CONCURRENTLY", prefix);
        if let Some(rest) = ddl.strip_prefix(&concurrent) {
            return format!("{}{}", prefix, rest);
        }
    }
    ddl.to_string()
}

fn render_statement(stmt: &PlannedStatement) -> String {
    let mut out = format!("{};", normalize_ddl(&stmt.ddl));
    for hazard in &stmt.hazards {
        out.push_str("\n-- [HAZARD]: ");
        out.push_str(&render_hazard(hazard));
    }
    out
}

fn render_hazard(hazard: &Hazard) -> String {
    if hazard.message.is_empty() {
        hazard.kind.clone()
    } else {
        format!("{}: {}", hazard.kind, hazard.message)
    }
}

/// File name for a generated migration: `NNNN.sql` or `NNNN_<description>.sql`.
pub fn migration_file_name(version: &Version, description: Option<&str>) -> String {
    let slug = description.map(slugify).filter(|s| !s.is_empty());
    match slug {
        Some(slug) => format!("{}_{}.sql", version, slug),
        None => format!("{}.sql", version),
    }
}

fn slugify(description: &str) -> String {
    let mut slug = String::new();
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// A rendered plan that is ready to be written as the next migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMigration {
    pub version: Version,
    pub filename: String,
    pub content: String,
}

/// Decide the file for `plan` given the existing catalog.
///
/// Returns `None` when the rendered plan is identical to the most recent
/// migration, so the same diff is never written twice.
pub fn prepare_new_migration(
    plan: &MigrationPlan,
    existing: &[MigrationFile],
    description: Option<&str>,
) -> Result<Option<NewMigration>> {
    let content = plan.render();
    if let Some(last) = catalog::latest(existing) {
        if last.content == content {
            return Ok(None);
        }
    }
    let version = catalog::next_version(existing)?;
    let filename = migration_file_name(&version, description);
    Ok(Some(NewMigration {
        version,
        filename,
        content,
    }))
}

/// Fail unless the database has applied every local migration, so a plan
/// applied on the spot lands directly after the latest file.
pub fn ensure_up_to_date(current: Option<&Version>, existing: &[MigrationFile]) -> Result<()> {
    let latest = catalog::latest(existing).map(|m| &m.version);
    if latest.is_none() || latest == current {
        return Ok(());
    }
    Err(MigrantError::NotUpToDate {
        current: current.map_or_else(|| "none".to_string(), |v| v.to_string()),
        latest: latest.map(|v| v.to_string()).unwrap_or_default(),
    })
}

impl NewMigration {
    /// Write into `dir`, refusing to overwrite an existing file.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.filename);
        if path.exists() {
            let exists = std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "migration file already exists",
            );
            return Err(MigrantError::io(&path, exists));
        }
        fs::write(&path, &self.content)
            .map_err(|e| MigrantError::io(&path, e))?;
        Ok(path)
    }
}
