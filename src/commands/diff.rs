//! `diff`: turn the difference between the declared schema and the live
//! database into the next migration file.

use std::path::PathBuf;

use anyhow::Result;
use colored::*;
use tracing::{info, warn};

use super::Context;
use crate::applier::Applier;
use crate::catalog::{list_local, validate_contiguous};
use crate::config::Config;
use crate::confirm::{Confirm, TerminalPrompt, require};
use crate::differ::{CommandDiffer, DiffRequest, SchemaDiffer, read_schema_files};
use crate::error::MigrantError;
use crate::plan::{ensure_up_to_date, prepare_new_migration};
use crate::store::{TRACKING_SCHEMA, VersionStore, read_or_init};
use crate::version::Version;

#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Apply the generated plan right away, after writing the file.
    pub migrate: bool,
    /// Description appended to the new file name.
    pub name: Option<String>,
}

/// What a diff run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// The live schema already matches the declared one.
    SchemaMatches,
    /// The plan renders to the same content as the latest file.
    Duplicate,
    /// A new file was written, and applied when `applied` is set.
    Created {
        path: PathBuf,
        applied: Option<Version>,
    },
}

pub async fn diff(ctx: &Context, options: DiffOptions) -> Result<()> {
    let differ = CommandDiffer::from_argv(&ctx.config.diff_command)?;

    let mut session = ctx.connect().await?;
    if !session.try_lock().await? {
        if let Err(e) = session.close().await {
            warn!(error = %e, "closing connection");
        }
        return Err(MigrantError::Locked.into());
    }

    let result = diff_with(&mut session, &ctx.config, &differ, &TerminalPrompt, &options).await;

    if let Err(e) = session.unlock().await {
        warn!(error = %e, "releasing migration lock");
    }
    if let Err(e) = session.close().await {
        warn!(error = %e, "closing connection");
    }

    match result? {
        DiffOutcome::SchemaMatches => {
            println!("{}", "schema matches expected. No plan generated".green());
        }
        DiffOutcome::Duplicate => {
            println!("No changes detected - migration content matches last file");
        }
        DiffOutcome::Created { path, applied } => {
            if let Some(version) = applied {
                println!("{} Applied {}", "✓".green(), version.to_string().yellow());
            }
            println!("\n{} Created new migration file: {}", "✓".green(), path.display());
        }
    }
    Ok(())
}

/// Plan against `target`, print the plan and write it as the next migration.
///
/// With `migrate`, the database must already be at the latest local version.
/// The file is written before the plan is applied, so a failed apply leaves
/// it behind as an ordinary pending migration.
pub async fn diff_with<T>(
    target: &mut T,
    config: &Config,
    differ: &dyn SchemaDiffer,
    confirm: &dyn Confirm,
    options: &DiffOptions,
) -> crate::Result<DiffOutcome>
where
    T: VersionStore + Applier + ?Sized,
{
    if config.schema_files.is_empty() {
        return Err(MigrantError::Config("no schema files provided".to_string()));
    }

    let current = read_or_init(target).await?;
    let dir = &config.migration_dir;
    let existing = list_local(dir)?;
    validate_contiguous(&existing)?;
    if options.migrate {
        ensure_up_to_date(current.as_ref(), &existing)?;
    }

    let mut exclude_schemas = config.exclude_schemas.clone();
    if !exclude_schemas.iter().any(|s| s == TRACKING_SCHEMA) {
        exclude_schemas.push(TRACKING_SCHEMA.to_string());
    }
    let request = DiffRequest {
        db_url: config.db_url.clone(),
        schemas: read_schema_files(&config.schema_files)?,
        exclude_schemas,
    };

    let plan = differ.plan(&request).await?;
    if plan.is_empty() {
        return Ok(DiffOutcome::SchemaMatches);
    }

    let description = options.name.as_deref();
    let Some(migration) = prepare_new_migration(&plan, &existing, description)? else {
        return Ok(DiffOutcome::Duplicate);
    };

    let hazards: usize = plan.statements.iter().map(|s| s.hazards.len()).sum();
    println!("{}", migration.content);
    if hazards > 0 {
        println!("{} {} hazard(s) in this plan", "⚠️".yellow(), hazards);
    }

    if !options.migrate {
        require(confirm, "Create new migration file?")?;
        let path = migration.write(dir)?;
        return Ok(DiffOutcome::Created {
            path,
            applied: None,
        });
    }

    require(confirm, "Apply this migration?")?;
    let path = migration.write(dir)?;
    let elapsed = target.apply(&migration.version, &migration.content).await?;
    info!(version = %migration.version, ?elapsed, "applied generated migration");
    Ok(DiffOutcome::Created {
        path,
        applied: Some(migration.version),
    })
}
