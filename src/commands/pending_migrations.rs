use std::path::Path;

use anyhow::Result;
use colored::*;

use super::Context;
use crate::catalog::{list_local, validate_contiguous};
use crate::pending::pending;
use crate::store::{VersionStore, read_or_init};
use crate::version::Version;

/// Print the version of every migration not yet applied.
pub async fn pending_migrations(ctx: &Context) -> Result<()> {
    let mut session = ctx.connect().await?;
    let versions = pending_versions(&mut session, &ctx.config.migration_dir).await;
    session.close().await?;

    let versions = versions?;
    if versions.is_empty() {
        println!("{}", "No pending migrations".green());
        return Ok(());
    }

    println!("{}", "Pending migrations:".cyan());
    for version in versions {
        println!("> {}", version);
    }
    Ok(())
}

/// Versions in `dir` newer than the one recorded in `store`.
pub async fn pending_versions<S>(store: &mut S, dir: &Path) -> crate::Result<Vec<Version>>
where
    S: VersionStore + ?Sized,
{
    let current = read_or_init(store).await?;
    let catalog = list_local(dir)?;
    validate_contiguous(&catalog)?;
    Ok(pending(current.as_ref(), &catalog)
        .into_iter()
        .map(|m| m.version.clone())
        .collect())
}
