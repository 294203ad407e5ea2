//! `check`: compare the local migration directory with the target branch.

use anyhow::Result;
use colored::*;

use super::Context;
use crate::catalog::{list_local, list_remote};
use crate::sync::check_with;

pub async fn check(ctx: &Context, github_token: Option<&str>) -> Result<()> {
    let remote = ctx.github(github_token)?;
    let remote_files = list_remote(&remote, &ctx.remote_migration_dir()).await?;
    let local_files = list_local(&ctx.config.migration_dir)?;

    check_with(&local_files, &remote_files, |m| {
        println!("Checking remote migration: {}", m.filename);
    })?;

    println!("\n{} All migrations are in sync\n", "✓".green());
    Ok(())
}
