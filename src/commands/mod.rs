//! CLI subcommands.
//!
//! One module per command. Each takes the resolved [`Context`] and reports
//! failures as `anyhow` errors wrapping [`crate::MigrantError`].

mod apply;
mod check;
mod clean;
mod current_version;
mod diff;
mod pending_migrations;
mod repo_last_migration;
mod squash;

pub use apply::apply;
pub use check::check;
pub use clean::{clean, clean_with, ensure_clean_allowed};
pub use current_version::current_version;
pub use diff::{DiffOptions, DiffOutcome, diff, diff_with};
pub use pending_migrations::{pending_migrations, pending_versions};
pub use repo_last_migration::repo_last_migration;
pub use squash::squash;

use anyhow::Result;

use crate::config::{Config, GitHubConfig};
use crate::confirm::{AutoApprove, Confirm, TerminalPrompt};
use crate::pg::PgSession;
use crate::remote::GitHubRepository;
use crate::shutdown::Shutdown;

/// Everything a command needs from the process.
pub struct Context {
    pub config: Config,
    pub shutdown: Shutdown,
}

impl Context {
    pub fn new(config: Config, shutdown: Shutdown) -> Self {
        Self { config, shutdown }
    }

    async fn connect(&self) -> Result<PgSession> {
        Ok(PgSession::connect(&self.config.db_url).await?)
    }

    fn github(&self, token: Option<&str>) -> Result<GitHubRepository> {
        let github: &GitHubConfig = self.config.github.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "environment {:?} has no [env.{}.github] section",
                self.config.env_name,
                self.config.env_name
            )
        })?;
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GITHUB_TOKEN is not set"))?;
        Ok(GitHubRepository::new(github, token))
    }

    /// Remote path of the migration directory, relative to the repository root.
    fn remote_migration_dir(&self) -> String {
        self.config.migration_dir.to_string_lossy().into_owned()
    }
}

fn confirmer(auto_approve: bool) -> Box<dyn Confirm> {
    if auto_approve {
        Box::new(AutoApprove)
    } else {
        Box::new(TerminalPrompt)
    }
}
