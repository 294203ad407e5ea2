//! Postgres implementation of the version store and the applier.
//!
//! One [`PgSession`] wraps a single connection for the whole run. Session
//! settings (timeouts, advisory lock) therefore stay on the connection that
//! executes the migrations.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, info, warn};
use url::Url;

use crate::applier::{Applier, SessionTimeouts, split_statements};
use crate::error::{MigrantError, Result};
use crate::store::{TRACKING_SCHEMA, TRACKING_TABLE, VersionStore};
use crate::version::Version;

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Advisory lock key serialising apply runs against one database ("pgmigran").
const RUN_LOCK_KEY: i64 = 0x7067_6d69_6772_616e;

/// A single Postgres connection owned by one pgmigrant run.
pub struct PgSession {
    conn: PgConnection,
    timeouts: SessionTimeouts,
}

impl PgSession {
    /// Connect using a `postgres://` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url = %redact_url(url), "connecting");
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| MigrantError::storage(format!("connecting to {}", redact_url(url)), e))?;
        Ok(Self {
            conn,
            timeouts: SessionTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Take the run-wide advisory lock. Returns `false` when another session holds it.
    pub async fn try_lock(&mut self) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| MigrantError::storage("acquiring migration lock", e))
    }

    pub async fn unlock(&mut self) -> Result<()> {
        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| MigrantError::storage("releasing migration lock", e))?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| MigrantError::storage("closing connection", e))
    }
}

#[async_trait]
impl VersionStore for PgSession {
    async fn ensure_tracking_exists(&mut self) -> Result<()> {
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", TRACKING_SCHEMA);
        (&mut self.conn)
            .execute(create_schema.as_str())
            .await
            .map_err(|e| MigrantError::storage("creating tracking schema", e))?;

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY CHECK (id = 1) DEFAULT 1,
                version text NOT NULL,
                created_at timestamptz NOT NULL DEFAULT now()
            )",
            TRACKING_TABLE
        );
        (&mut self.conn)
            .execute(create_table.as_str())
            .await
            .map_err(|e| MigrantError::storage("creating tracking table", e))?;
        Ok(())
    }

    async fn read_current_version(&mut self) -> Result<Option<Version>> {
        let sql = format!("SELECT version FROM {}", TRACKING_TABLE);
        let row = sqlx::query_scalar::<_, String>(&sql)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| {
                if is_undefined_table(&e) {
                    MigrantError::TrackingAbsent
                } else {
                    MigrantError::storage("reading current version", e)
                }
            })?;

        row.map(|raw| Version::parse_for(&raw, TRACKING_TABLE))
            .transpose()
    }

    async fn drop_tracking(&mut self) -> Result<()> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| MigrantError::storage("beginning transaction", e))?;

        let statements = [
            format!("DROP SCHEMA IF EXISTS {} CASCADE", TRACKING_SCHEMA),
            "DROP SCHEMA IF EXISTS public CASCADE".to_string(),
            "CREATE SCHEMA public".to_string(),
        ];
        for stmt in &statements {
            debug!(sql = %stmt, "clean");
            (&mut *tx)
                .execute(stmt.as_str())
                .await
                .map_err(|e| MigrantError::storage(format!("executing {:?}", stmt), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| MigrantError::storage("committing clean", e))
    }
}

#[async_trait]
impl Applier for PgSession {
    async fn apply(&mut self, version: &Version, sql: &str) -> Result<Duration> {
        let start = Instant::now();
        let timeouts = self.timeouts;

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| MigrantError::storage("beginning transaction", e))?;

        match run_migration(&mut tx, &timeouts, version, sql).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| MigrantError::storage("committing transaction", e))?;
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(%version, error = %rollback, "rollback failed");
                }
                return Err(err);
            }
        }

        let elapsed = start.elapsed();
        info!(%version, ?elapsed, "migration applied");
        Ok(elapsed)
    }
}

async fn run_migration(
    conn: &mut PgConnection,
    timeouts: &SessionTimeouts,
    version: &Version,
    sql: &str,
) -> Result<()> {
    for setting in timeouts.set_statements() {
        (&mut *conn)
            .execute(setting.as_str())
            .await
            .map_err(|e| MigrantError::storage(format!("executing {:?}", setting), e))?;
    }

    let fragments = split_statements(sql);
    let total = fragments.len();
    for (i, fragment) in fragments.into_iter().enumerate() {
        debug!(%version, statement = i + 1, total, sql = fragment.trim(), "executing");
        if let Err(e) = (&mut *conn).execute(fragment).await {
            return Err(MigrantError::storage(
                format!("migration {} failed at statement {}/{}", version, i + 1, total),
                e,
            ));
        }
    }

    write_current_version(conn, version).await
}

/// Upsert the marker row. Only called inside the apply transaction.
async fn write_current_version(conn: &mut PgConnection, version: &Version) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (id, version) VALUES (1, $1)
         ON CONFLICT (id) DO UPDATE SET version = EXCLUDED.version",
        TRACKING_TABLE
    );
    sqlx::query(&sql)
        .bind(version.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| MigrantError::storage("updating current version", e))?;
    Ok(())
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNDEFINED_TABLE),
        _ => false,
    }
}

/// Connection string with the password masked, safe for logs and errors.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
