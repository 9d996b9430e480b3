//! Embedded SQLite audit trail.
//!
//! Every record the pipeline produces is appended here as raw JSON, keyed
//! by record kind and the originating request id. The store is write-only
//! from the pipeline's point of view; nothing in the dispatch path ever
//! reads it back.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use cascade_core::{CascadeResult, DatabaseConfig};
use cascade_domain::entities::RecordKind;
use cascade_domain::ports::AuditStore;

pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    /// Wraps an existing pool. The schema must already be in place.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (and creates if missing) the audit database and runs the
    /// schema migration.
    pub async fn connect(config: &DatabaseConfig) -> CascadeResult<Self> {
        debug!("opening audit database: url={}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> CascadeResult<()> {
        debug!("running audit database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                correlation_id TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_records_correlation
             ON audit_records (correlation_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn health_check(&self) -> CascadeResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn save(
        &self,
        kind: RecordKind,
        payload: &Value,
        correlation_id: &str,
    ) -> CascadeResult<()> {
        sqlx::query(
            "INSERT INTO audit_records (kind, payload, correlation_id) VALUES ($1, $2, $3)",
        )
        .bind(kind.as_str())
        .bind(payload.to_string())
        .bind(correlation_id)
        .execute(&self.pool)
        .await?;

        debug!("audit record saved: kind={kind}, correlation_id={correlation_id}");
        Ok(())
    }
}
