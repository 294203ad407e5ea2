use anyhow::Result;
use colored::*;

use super::Context;
use crate::config::Config;
use crate::confirm::{Confirm, TerminalPrompt, require};
use crate::error::MigrantError;
use crate::store::VersionStore;

/// Drop the tracking schema and `public`, leaving an empty database.
///
/// Only allowed for environments with `allow_db_clean = true`, and always
/// asks first.
pub async fn clean(ctx: &Context) -> Result<()> {
    ensure_clean_allowed(&ctx.config)?;

    let mut session = ctx.connect().await?;
    println!(
        "{} This drops every object in the {} and {} schemas.",
        "⚠️".yellow(),
        "pgmigrant".bold(),
        "public".bold()
    );
    let result = clean_with(&mut session, &TerminalPrompt).await;
    session.close().await?;
    result?;

    println!("\n{} Cleaned database schema", "✓".green());
    Ok(())
}

pub fn ensure_clean_allowed(config: &Config) -> crate::Result<()> {
    if config.allow_db_clean {
        Ok(())
    } else {
        Err(MigrantError::Config(
            "allow_db_clean=false, refusing to clean database schema".to_string(),
        ))
    }
}

/// Confirm, then drop.
pub async fn clean_with<S>(store: &mut S, confirm: &dyn Confirm) -> crate::Result<()>
where
    S: VersionStore + ?Sized,
{
    require(confirm, "Clean database schema?")?;
    store.drop_tracking().await
}
