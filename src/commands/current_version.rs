use anyhow::{Result, bail};

use super::Context;
use crate::error::MigrantError;
use crate::store::VersionStore;

/// Print the version recorded in the database.
pub async fn current_version(ctx: &Context) -> Result<()> {
    let mut session = ctx.connect().await?;
    let current = session.read_current_version().await;
    session.close().await?;

    match current {
        Err(MigrantError::TrackingAbsent) => bail!("no migrations applied yet"),
        Err(e) => Err(e.into()),
        Ok(Some(version)) => {
            println!("Current version: {}", version);
            Ok(())
        }
        Ok(None) => {
            println!("No migrations applied yet");
            Ok(())
        }
    }
}
