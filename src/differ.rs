//! Schema diffing capability.
//!
//! pgmigrant does not compute diffs itself. A [`SchemaDiffer`] compares the
//! declared schema files with the live database and hands back a
//! [`MigrationPlan`]. [`CommandDiffer`] delegates to an external program that
//! speaks JSON over stdin/stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MigrantError, Result};
use crate::plan::MigrationPlan;

/// One declared schema file, read whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSource {
    pub path: PathBuf,
    pub sql: String,
}

/// Everything a differ needs to produce a plan.
#[derive(Debug, Clone, Serialize)]
pub struct DiffRequest {
    pub db_url: String,
    pub schemas: Vec<SchemaSource>,
    pub exclude_schemas: Vec<String>,
}

#[async_trait]
pub trait SchemaDiffer: Send + Sync {
    async fn plan(&self, request: &DiffRequest) -> Result<MigrationPlan>;
}

/// Read schema files for a diff. Every file must have a `.sql` extension.
///
/// Files are not split into statements: doing that safely would require
/// parsing SQL.
pub fn read_schema_files(paths: &[PathBuf]) -> Result<Vec<SchemaSource>> {
    paths
        .iter()
        .map(|path| {
            if !has_sql_extension(path) {
                return Err(MigrantError::Diff(format!(
                    "file {:?} is not a .sql file",
                    path.display().to_string()
                )));
            }
            let sql = std::fs::read_to_string(path)
                .map_err(|e| MigrantError::io(path, e))?;
            Ok(SchemaSource {
                path: path.clone(),
                sql,
            })
        })
        .collect()
}

fn has_sql_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
}

/// Runs an external diff tool.
///
/// The request is written to the tool's stdin as JSON; the tool must print a
/// plan as JSON on stdout:
/// `{"statements":[{"ddl":"...","hazards":[{"type":"...","message":"..."}]}]}`.
pub struct CommandDiffer {
    program: String,
    args: Vec<String>,
}

impl CommandDiffer {
    /// Build from a command line such as `["pg-schema-diff-json", "--strict"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MigrantError::Config("diff_command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl SchemaDiffer for CommandDiffer {
    async fn plan(&self, request: &DiffRequest) -> Result<MigrationPlan> {
        let input = serde_json::to_vec(request)
            .map_err(|e| MigrantError::Diff(format!("encoding request: {}", e)))?;

        debug!(program = %self.program, "running diff command");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MigrantError::Diff(format!("starting {}: {}", self.program, e)))?;

        // Feed stdin while stdout/stderr drain. Dropping stdin sends EOF.
        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&input).await {
                // A tool that exits without reading its input is judged by its exit status.
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        written
            .map_err(|e| MigrantError::Diff(format!("writing to {}: {}", self.program, e)))?;
        let output = output
            .map_err(|e| MigrantError::Diff(format!("waiting for {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(MigrantError::Diff(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_plan(&output.stdout)
    }
}

/// Decode the plan JSON printed by a diff tool.
pub fn parse_plan(stdout: &[u8]) -> Result<MigrationPlan> {
    serde_json::from_slice(stdout)
        .map_err(|e| MigrantError::Diff(format!("malformed plan output: {}", e)))
}
