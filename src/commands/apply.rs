//! `apply`: run pending migrations under the migration lock.

use anyhow::Result;
use colored::*;
use tracing::warn;

use super::{Context, confirmer};
use crate::error::MigrantError;
use crate::pg::redact_url;
use crate::run::{ApplyOptions, apply_pending};

pub async fn apply(ctx: &Context, auto_approve: bool, dry_run: bool) -> Result<()> {
    println!(
        "{} {}",
        "Applying migrations to".cyan().bold(),
        redact_url(&ctx.config.db_url).yellow()
    );

    let mut session = ctx.connect().await?;
    if !session.try_lock().await? {
        if let Err(e) = session.close().await {
            warn!(error = %e, "closing connection");
        }
        return Err(MigrantError::Locked.into());
    }

    let confirm = confirmer(auto_approve);
    let result = apply_pending(
        &mut session,
        &ctx.config.migration_dir,
        confirm.as_ref(),
        &ctx.shutdown,
        ApplyOptions { dry_run },
    )
    .await;

    if let Err(e) = session.unlock().await {
        warn!(error = %e, "releasing migration lock");
    }
    if let Err(e) = session.close().await {
        warn!(error = %e, "closing connection");
    }

    let report = result?;
    if dry_run && !report.previewed.is_empty() {
        println!(
            "{} {} migration(s) would be applied",
            "→".cyan(),
            report.previewed.len()
        );
    } else if !report.applied.is_empty() {
        println!(
            "{} Applied {} migration(s), now at {}",
            "✓".green(),
            report.applied.len(),
            report
                .applied
                .last()
                .map(|v| v.to_string())
                .unwrap_or_default()
                .yellow()
        );
    }
    Ok(())
}
