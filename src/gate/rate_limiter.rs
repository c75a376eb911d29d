//! Per-identity cooldown gate.
//!
//! Entry-level locking in `DashMap` serializes the check-and-record step for
//! one identity; different identities never contend.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{CallerId, LensError, Result};

#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_call: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: DashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Accept and record a call, or reject it if the identity's previous
    /// accepted call is inside the cooldown window
    pub fn check(&self, identity: &CallerId) -> Result<()> {
        let now = Instant::now();

        match self.last_call.entry(identity.to_string()) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.duration_since(*entry.get());
                if elapsed < self.cooldown {
                    return Err(LensError::RateLimited {
                        identity: identity.to_string(),
                        retry_after: self.cooldown - elapsed,
                    });
                }
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }

        Ok(())
    }

    /// Identities currently tracked
    pub fn len(&self) -> usize {
        self.last_call.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_call.is_empty()
    }

    /// Drop identities whose window has passed; returns how many were removed
    pub fn prune(&self) -> usize {
        let before = self.last_call.len();
        let cooldown = self.cooldown;
        self.last_call
            .retain(|_, last| last.elapsed() < cooldown);
        before - self.last_call.len()
    }
}
