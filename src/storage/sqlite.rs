//! SQLite Store with Connection Pooling
//!
//! Persists the key-value contract in a single `kv` table:
//! - Connection pooling via r2d2 for concurrent access
//! - Blocking SQLite work moved off the async runtime with `spawn_blocking`
//! - Multi-key writes applied in one transaction
//! - WAL mode for concurrent readers
//!
//! Values are stored as JSON text.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};
use serde_json::Value;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::types::{LensError, Result, ResultExt};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Current schema version, tracked in `PRAGMA user_version`
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout_secs: 30,
        }
    }
}

type SqlitePool = Pool<SqliteConnectionManager>;

/// Pooled SQLite key-value store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl SqliteStore {
    /// Open (and initialize) a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| LensError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        debug!("Opened SQLite store at {}", path.as_ref().display());
        Ok(store)
    }

    /// In-memory store; a single connection so every caller sees one database
    pub fn open_in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| LensError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.pool.get()?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if current_version > SCHEMA_VERSION {
            warn!(
                "Store schema version {} is newer than supported {}",
                current_version, SCHEMA_VERSION
            );
        }

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize store schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    /// Run blocking SQLite work on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PooledConnection<SqliteConnectionManager>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let keys = keys.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
            let mut found = HashMap::with_capacity(keys.len());
            for key in keys {
                let raw: Option<String> = stmt
                    .query_row(params![key], |row| row.get(0))
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                if let Some(raw) = raw {
                    found.insert(key, serde_json::from_str(&raw)?);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            let tx = conn
                .transaction()
                .with_context("Failed to start transaction")?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                    updated_at = excluded.updated_at",
                )?;
                for (key, value) in &entries {
                    stmt.execute(params![key, serde_json::to_string(value)?, now])?;
                }
            }
            tx.commit().with_context("Failed to commit transaction")?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let keys = keys.to_vec();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .with_context("Failed to start transaction")?;
            {
                let mut stmt = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
                for key in &keys {
                    stmt.execute(params![key])?;
                }
            }
            tx.commit().with_context("Failed to commit transaction")?;
            Ok(())
        })
        .await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.with_conn(move |conn| {
            // substr comparison avoids LIKE wildcard escaping
            let mut stmt = conn.prepare_cached(
                "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set(HashMap::from([
                ("apiKey".to_string(), json!("sk-1")),
                ("limit_fp_2026-01-01".to_string(), json!(3)),
            ]))
            .await
            .unwrap();

        let found = store
            .get(&["apiKey".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["apiKey"], json!("sk-1"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_one("k", json!(1)).await.unwrap();
        store.set_one("k", json!({"nested": [1, 2]})).await.unwrap();

        assert_eq!(
            store.get_one("k").await.unwrap(),
            Some(json!({"nested": [1, 2]}))
        );
    }

    #[tokio::test]
    async fn test_prefix_scan_treats_wildcards_literally() {
        let store = SqliteStore::open_in_memory().unwrap();
        for key in ["cache_a", "cache_b", "cacheXc", "limit_a"] {
            store.set_one(key, json!(null)).await.unwrap();
        }

        assert_eq!(
            store.keys_with_prefix("cache_").await.unwrap(),
            vec!["cache_a", "cache_b"]
        );

        store
            .remove(&["cache_a".to_string(), "limit_a".to_string()])
            .await
            .unwrap();
        assert_eq!(store.keys_with_prefix("").await.unwrap(), vec!["cacheXc", "cache_b"]);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_one("apiKey", json!("persisted")).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_one("apiKey").await.unwrap(),
            Some(json!("persisted"))
        );
    }
}
