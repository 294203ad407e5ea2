use anyhow::Result;
use colored::*;

use super::Context;
use crate::squash::{SquashOutcome, squash_pending};

/// Merge all pending migrations into the lowest pending file.
pub async fn squash(ctx: &Context) -> Result<()> {
    let mut session = ctx.connect().await?;
    let outcome = squash_pending(&mut session, &ctx.config.migration_dir).await;
    session.close().await?;

    match outcome? {
        SquashOutcome::NothingPending => {
            println!("{}", "No pending migrations".green());
        }
        SquashOutcome::Squashed {
            into,
            merged,
            removed,
        } => {
            for name in &merged {
                println!("  {} {}", "→".cyan(), name);
            }
            for path in &removed {
                println!("  {} removed {}", "-".red(), path.display());
            }
            println!(
                "{} Squashed {} migration(s) into {}",
                "✓".green(),
                merged.len(),
                into.display().to_string().yellow()
            );
        }
    }
    Ok(())
}
