//! Daily Usage Quota
//!
//! Counts consuming calls per `(fingerprint, day)` in the key-value store
//! under `limit_{fingerprint}_{day}`, where day is the local calendar date.
//!
//! ## Semantics
//! - Check-only mode reports usage and never writes
//! - Consuming mode increments only while `usage < limit`; at the limit it
//!   reports `blocked` with the unchanged count
//!
//! The store is only atomic per key, so the read-modify-write runs under one
//! async mutex. Old day counters are never deleted here.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::fingerprint::Fingerprint;
use crate::constants::gate::USAGE_KEY_PREFIX;
use crate::storage::SharedStore;
use crate::types::Result;

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub blocked: bool,
    pub usage: u32,
    pub limit: u32,
}

pub struct QuotaLimiter {
    store: SharedStore,
    daily_limit: u32,
    lock: Mutex<()>,
}

impl QuotaLimiter {
    pub fn new(store: SharedStore, daily_limit: u32) -> Self {
        Self {
            store,
            daily_limit,
            lock: Mutex::new(()),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Check (and optionally consume) today's quota
    pub async fn check(&self, fingerprint: &Fingerprint, consume: bool) -> Result<QuotaStatus> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.check_on(fingerprint, &today, consume).await
    }

    /// Same as [`check`](Self::check) for an explicit calendar day
    pub async fn check_on(
        &self,
        fingerprint: &Fingerprint,
        day: &str,
        consume: bool,
    ) -> Result<QuotaStatus> {
        let key = usage_key(fingerprint, day);
        let _guard = self.lock.lock().await;

        let usage = self
            .store
            .get_one(&key)
            .await?
            .and_then(|value| parse_usage(&value))
            .unwrap_or(0);

        if usage >= self.daily_limit {
            debug!("Quota blocked for {} ({}/{})", fingerprint, usage, self.daily_limit);
            return Ok(QuotaStatus {
                blocked: true,
                usage,
                limit: self.daily_limit,
            });
        }

        let usage = if consume {
            let next = usage + 1;
            self.store.set_one(&key, Value::from(next)).await?;
            next
        } else {
            usage
        };

        Ok(QuotaStatus {
            blocked: false,
            usage,
            limit: self.daily_limit,
        })
    }
}

fn usage_key(fingerprint: &Fingerprint, day: &str) -> String {
    format!("{}{}_{}", USAGE_KEY_PREFIX, fingerprint, day)
}

/// Counters written by other clients may be numeric strings
fn parse_usage(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.min(u64::from(u32::MAX)) as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
