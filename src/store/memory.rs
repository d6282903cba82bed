//! In-process Entry Store
//!
//! A `HashMap` behind a mutex. Expiry is enforced lazily on every access and
//! swept periodically by a background task. Entries live only as long as the
//! process and are not shared between instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{CasOutcome, EntryStore, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of entries currently held, including expired ones not yet swept
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Spawn the periodic sweeper
    pub fn start_cleanup(&self, interval: Duration) -> SweeperHandle {
        let store = self.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            tracing::debug!(
                                "Sweeper removed {} expired entries, {} remaining",
                                removed,
                                store.entry_count()
                            );
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        SweeperHandle { stop_tx, task }
    }
}

/// Stops the background sweeper
pub struct SweeperHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.expires_at - now)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: String,
    ) -> StoreResult<CasOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(key) else {
            return Ok(CasOutcome::Absent);
        };
        if !entry.is_live(now) {
            entries.remove(key);
            return Ok(CasOutcome::Absent);
        }
        if entry.value != expected {
            return Ok(CasOutcome::Mismatch);
        }

        // expires_at is left untouched
        entry.value = new;
        Ok(CasOutcome::Swapped)
    }
}
