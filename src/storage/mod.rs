//! Key-Value Persistence
//!
//! The analyzer keeps three kinds of state outside the process: cached
//! results, daily usage counters, and saved settings. All of it goes through
//! the `KeyValueStore` contract, which is atomic per key only.
//!
//! ## Backends
//!
//! - `MemoryStore`: process-local, for tests and `storage.path = None`
//! - `SqliteStore`: pooled SQLite file, the CLI default

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{PoolConfig, SqliteStore};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::types::Result;

/// Shared store handle for async contexts.
pub type SharedStore = Arc<dyn KeyValueStore>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Values for the keys that exist; missing keys are simply absent
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>>;

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    async fn remove(&self, keys: &[String]) -> Result<()>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    async fn get_one(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(&[key.to_string()]).await?.remove(key))
    }

    async fn set_one(&self, key: &str, value: Value) -> Result<()> {
        self.set(HashMap::from([(key.to_string(), value)])).await
    }
}

/// Open the store described by `config`, creating parent directories
pub fn open_store(config: &StorageConfig) -> Result<SharedStore> {
    match &config.path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SqliteStore::open(path)?))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}
