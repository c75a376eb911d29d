//! Result Cache
//!
//! Content-keyed cache of unified results, consulted before any service call.
//!
//! ## Keys
//!
//! - `cache_{sha256(text)}`; the entry also stores the exact text, and a hit
//!   requires it to match byte for byte (no normalization)
//!
//! ## Retention
//!
//! Entries older than the retention window (default 7 days) are removed by a
//! sweep that runs at startup and then on a fixed interval. Sweeping is
//! housekeeping only: a stale entry that has not been swept is still a hit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::cache::KEY_PREFIX;
use crate::storage::SharedStore;
use crate::types::{Result, UnifiedResult};

/// Stored cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub text: String,
    pub result: UnifiedResult,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    /// Entries past retention that the next sweep will remove
    pub expired: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct ResultCache {
    store: SharedStore,
    retention: chrono::Duration,
}

impl ResultCache {
    pub fn new(store: SharedStore, retention: chrono::Duration) -> Self {
        Self { store, retention }
    }

    pub fn cache_key(text: &str) -> String {
        format!("{}{:x}", KEY_PREFIX, Sha256::digest(text.as_bytes()))
    }

    pub async fn get(&self, text: &str) -> Result<Option<UnifiedResult>> {
        let key = Self::cache_key(text);
        let Some(raw) = self.store.get_one(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) if entry.text == text => {
                debug!("Cache hit ({} tokens)", entry.result.token_count);
                Ok(Some(entry.result))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn put(&self, text: &str, result: &UnifiedResult) -> Result<()> {
        let entry = CacheEntry {
            text: text.to_string(),
            result: result.clone(),
            created_at: Utc::now(),
        };
        self.store
            .set_one(&Self::cache_key(text), serde_json::to_value(&entry)?)
            .await
    }

    /// Remove entries older than the retention window
    pub async fn sweep(&self) -> Result<usize> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep as if the current time were `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let entries = self.load_all().await?;

        let expired: Vec<String> = entries
            .into_iter()
            .filter(|(_, entry)| match entry {
                Some(entry) => now - entry.created_at > self.retention,
                // unreadable records can never be served
                None => true,
            })
            .map(|(key, _)| key)
            .collect();

        self.store.remove(&expired).await?;
        Ok(expired.len())
    }

    /// Remove every cache entry
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.store.keys_with_prefix(KEY_PREFIX).await?;
        self.store.remove(&keys).await?;
        info!("Cleared {} cache entries", keys.len());
        Ok(keys.len())
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let entries = self.load_all().await?;

        let mut stats = CacheStats {
            entries: entries.len(),
            ..Default::default()
        };
        for entry in entries.iter().filter_map(|(_, e)| e.as_ref()) {
            if now - entry.created_at > self.retention {
                stats.expired += 1;
            }
            stats.oldest = Some(stats.oldest.map_or(entry.created_at, |t| t.min(entry.created_at)));
            stats.newest = Some(stats.newest.map_or(entry.created_at, |t| t.max(entry.created_at)));
        }
        Ok(stats)
    }

    /// One sweep whose outcome is logged rather than returned
    pub async fn sweep_logged(&self) {
        match self.sweep().await {
            Ok(0) => debug!("Cache sweep: nothing expired"),
            Ok(removed) => info!("Cache sweep removed {} expired entries", removed),
            Err(e) => warn!("Cache sweep failed: {}", e),
        }
    }

    /// Sweep now, then every `interval`, until the handle is aborted.
    /// Sweep failures are logged and never stop the loop.
    pub fn spawn_housekeeping(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_logged().await;
            }
        })
    }

    async fn load_all(&self) -> Result<Vec<(String, Option<CacheEntry>)>> {
        let keys = self.store.keys_with_prefix(KEY_PREFIX).await?;
        let mut values = self.store.get(&keys).await?;

        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let raw: Value = values.remove(&key)?;
                let entry = serde_json::from_value(raw).ok();
                Some((key, entry))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};
    use serde_json::json;

    fn result(accuracy: f64) -> UnifiedResult {
        UnifiedResult {
            accuracy,
            suggestions: vec!["Be concise".to_string()],
            reword: "Shorter prompt".to_string(),
            was_chunked: false,
            token_count: 42,
            chunk_count: 1,
            already_optimal: false,
        }
    }

    fn cache(store: Arc<MemoryStore>) -> ResultCache {
        ResultCache::new(store, chrono::Duration::days(7))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = cache(Arc::new(MemoryStore::new()));
        cache.put("Explain monads", &result(81.0)).await.unwrap();

        assert_eq!(
            cache.get("Explain monads").await.unwrap(),
            Some(result(81.0))
        );
    }

    #[test]
    fn test_cache_key_is_prefixed_sha256_hex() {
        assert_eq!(
            ResultCache::cache_key(""),
            "cache_e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_exact_text_only() {
        let cache = cache(Arc::new(MemoryStore::new()));
        cache.put("Explain monads", &result(81.0)).await.unwrap();

        assert_eq!(cache.get("Explain monads.").await.unwrap(), None);
        assert_eq!(cache.get("explain monads").await.unwrap(), None);
        assert_eq!(cache.get(" Explain monads").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sweep_after_retention() {
        let cache = cache(Arc::new(MemoryStore::new()));
        cache.put("prompt", &result(50.0)).await.unwrap();

        assert_eq!(cache.sweep().await.unwrap(), 0);
        assert!(cache.get("prompt").await.unwrap().is_some());

        let later = Utc::now() + chrono::Duration::days(8);
        assert_eq!(cache.sweep_at(later).await.unwrap(), 1);
        assert_eq!(cache.get("prompt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stale_entry_served_until_swept() {
        let store = Arc::new(MemoryStore::new());
        let entry = CacheEntry {
            text: "old".to_string(),
            result: result(70.0),
            created_at: Utc::now() - chrono::Duration::days(30),
        };
        store
            .set_one(&ResultCache::cache_key("old"), serde_json::to_value(&entry).unwrap())
            .await
            .unwrap();
        let cache = cache(store);

        assert!(cache.get("old").await.unwrap().is_some());
        assert_eq!(cache.stats().await.unwrap().expired, 1);
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert!(cache.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_miss_and_swept() {
        let store = Arc::new(MemoryStore::new());
        let key = ResultCache::cache_key("broken");
        store.set_one(&key, json!({"garbage": 1})).await.unwrap();
        let cache = cache(store.clone());

        assert_eq!(cache.get("broken").await.unwrap(), None);
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert_eq!(store.get_one(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_leaves_other_keys() {
        let store = Arc::new(MemoryStore::new());
        store.set_one("limit_fp_2026-01-01", json!(3)).await.unwrap();
        let cache = cache(store.clone());
        cache.put("a", &result(1.0)).await.unwrap();
        cache.put("b", &result(2.0)).await.unwrap();

        assert_eq!(cache.stats().await.unwrap().entries, 2);
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.stats().await.unwrap().entries, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_housekeeping_sweeps_on_start() {
        let store = Arc::new(MemoryStore::new());
        let entry = CacheEntry {
            text: "old".to_string(),
            result: result(70.0),
            created_at: Utc::now() - chrono::Duration::days(8),
        };
        let key = ResultCache::cache_key("old");
        store
            .set_one(&key, serde_json::to_value(&entry).unwrap())
            .await
            .unwrap();

        let handle = Arc::new(cache(store.clone())).spawn_housekeeping(Duration::from_secs(3600));

        let mut removed = false;
        for _ in 0..100 {
            if store.get_one(&key).await.unwrap().is_none() {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(removed);
    }
}
