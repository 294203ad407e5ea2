//! pgmigrant CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pgmigrant::MigrantError;
use pgmigrant::commands::{self, Context, DiffOptions};
use pgmigrant::config::{Config, DEFAULT_CONFIG_PATH, parse_var};
use pgmigrant::shutdown::Shutdown;

#[derive(Parser)]
#[command(name = "pgmigrant", version, about = "Versioned SQL migrations for Postgres")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Environment to use from the configuration file
    #[arg(long, global = true)]
    env: Option<String>,

    /// Input variable, as KEY=VALUE (repeatable)
    #[arg(long = "var", global = true, value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the migration version recorded in the database
    CurrentVersion,

    /// Print the version of each pending migration
    PendingMigrations,

    /// Apply pending migrations
    Apply {
        /// Apply without asking for confirmation
        #[arg(long)]
        auto_approve: bool,

        /// Print pending migrations without executing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Diff the declared schema files against the database
    Diff {
        /// Apply the generated migration right away
        #[arg(long)]
        migrate: bool,

        /// Description appended to the new migration file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Merge all pending migrations into one file
    Squash,

    /// Check local migrations against the repository's target branch
    Check {
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// Print the last migration version on the repository's target branch
    RepoLastMigration {
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// Drop the database schema (only when allow_db_clean = true)
    Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let shutdown = Shutdown::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    match run(cli, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<MigrantError>() {
                Some(MigrantError::AbortedByOperator(what)) => {
                    eprintln!("{} {}", "aborted:".yellow(), what);
                }
                _ => eprintln!("{} {:#}", "✗".red(), err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, shutdown: Shutdown) -> Result<()> {
    let global = cli.global;
    let config = Config::load(&global.config, global.env.as_deref(), &global.vars)?;
    let ctx = Context::new(config, shutdown);

    match cli.command {
        Commands::CurrentVersion => commands::current_version(&ctx).await,
        Commands::PendingMigrations => commands::pending_migrations(&ctx).await,
        Commands::Apply {
            auto_approve,
            dry_run,
        } => commands::apply(&ctx, auto_approve, dry_run).await,
        Commands::Diff { migrate, name } => {
            commands::diff(&ctx, DiffOptions { migrate, name }).await
        }
        Commands::Squash => commands::squash(&ctx).await,
        Commands::Check { github_token } => commands::check(&ctx, github_token.as_deref()).await,
        Commands::RepoLastMigration { github_token } => {
            commands::repo_last_migration(&ctx, github_token.as_deref()).await
        }
        Commands::Clean => commands::clean(&ctx).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pgmigrant=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// First signal requests a graceful stop; the second exits immediately.
#[cfg(unix)]
async fn watch_signals(shutdown: Shutdown) {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut interrupt), Ok(mut terminate), Ok(mut hangup)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        warn!("could not install signal handlers");
        return;
    };

    for received in 1.. {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
            _ = hangup.recv() => {}
        }
        if received > 1 {
            std::process::exit(1);
        }
        shutdown.request();
        println!("interrupt received, wait for exit or ^C to terminate");
    }
}

#[cfg(not(unix))]
async fn watch_signals(shutdown: Shutdown) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("could not install Ctrl-C handler");
        return;
    }
    shutdown.request();
    println!("interrupt received, wait for exit or ^C to terminate");
    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(1);
    }
}
