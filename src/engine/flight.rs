//! Keyed single-flight guard for cache backfills.
//!
//! The first caller for a key holds the guard while it backfills; later
//! callers wait on the same lock and must re-check the cache once they
//! get in, so they reuse the first caller's result instead of repeating
//! the upstream call.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 256;

#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the key for a backfill of `kind` scoped to `scope`.
    pub fn key(kind: &str, scope: &str) -> String {
        format!("{kind}:{scope}")
    }

    /// Wait for exclusive ownership of `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            if inflight.len() > PRUNE_THRESHOLD {
                inflight.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn tracked(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
