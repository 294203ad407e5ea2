use anyhow::Result;

use super::Context;
use crate::catalog::version_from_filename;
use crate::remote::{EntryKind, RemoteRepository};

/// Print the version of the last migration on the target branch.
pub async fn repo_last_migration(ctx: &Context, github_token: Option<&str>) -> Result<()> {
    let remote = ctx.github(github_token)?;
    let entries = remote.list_dir(&ctx.remote_migration_dir()).await?;

    match entries.iter().rfind(|e| e.kind == EntryKind::File) {
        Some(last) => println!("Current version: {}", version_from_filename(&last.name)?),
        None => println!("No migrations applied yet"),
    }
    Ok(())
}
