use crate::types::{Result, SeenStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// SQLite file holding one table of seen links per destination.
///
/// All partitions share one pool. SQLite serializes writers on the file lock
/// and WAL lets readers proceed meanwhile, so destinations writing to their
/// own tables concurrently cannot corrupt each other. Every insert runs in its
/// own transaction with `synchronous=FULL`, so a successful `record` has been
/// flushed to disk.
#[derive(Clone)]
pub struct SeenDb {
    pool: SqlitePool,
}

impl SeenDb {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Opened seen database at {}", path.display());
        Ok(Self { pool })
    }

    /// Open (creating if needed) the partition for one destination.
    pub async fn partition(&self, key: &str) -> Result<SeenPartition> {
        let table = quote_ident(key);
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (link TEXT PRIMARY KEY NOT NULL, seen_at TEXT NOT NULL)",
            table
        ))
        .execute(&self.pool)
        .await?;

        debug!("Opened seen partition '{}'", key);
        Ok(SeenPartition {
            pool: self.pool.clone(),
            key: key.to_string(),
            table,
        })
    }

    /// Names of every partition present in the file.
    pub async fn partitions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("name")).collect())
    }

    /// Read-only: a destination with no table yet has seen nothing.
    pub async fn has(&self, key: &str, link: &str) -> Result<bool> {
        let exists = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let row = sqlx::query(&format!(
            "SELECT 1 FROM {} WHERE link = ?1 LIMIT 1",
            quote_ident(key)
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn record(&self, key: &str, link: &str) -> Result<()> {
        self.partition(key).await?.insert(link).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Handle on one destination's table.
#[derive(Clone)]
pub struct SeenPartition {
    pool: SqlitePool,
    key: String,
    table: String,
}

impl SeenPartition {
    pub async fn contains(&self, link: &str) -> Result<bool> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE link = ?1 LIMIT 1", self.table))
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn insert(&self, link: &str) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (link, seen_at) VALUES (?1, ?2)",
            self.table
        ))
        .bind(link)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn len(&self) -> Result<usize> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count").max(0) as usize)
    }
}

#[async_trait]
impl SeenStore for SeenPartition {
    fn key(&self) -> &str {
        &self.key
    }

    async fn has(&self, link: &str) -> anyhow::Result<bool> {
        Ok(self.contains(link).await?)
    }

    async fn record(&self, link: &str) -> anyhow::Result<()> {
        Ok(self.insert(link).await?)
    }
}

/// Destination names are arbitrary text; quote them as SQL identifiers.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
