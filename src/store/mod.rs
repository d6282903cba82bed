//! Entry Store
//!
//! TTL-bounded key-value storage behind a single trait, so the token relay
//! can run against an in-process map or an external Redis instance without
//! changes to the lifecycle controller.
//!
//! Values are opaque strings (the relay stores serialized records). Every
//! entry carries an absolute expiry; an entry past its expiry is reported as
//! absent by every operation, whether or not it has been swept yet.

mod error;
mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::config::{Config, StoreBackend};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Result of an atomic compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The live value matched and was replaced; its expiry is unchanged
    Swapped,
    /// A live value exists but differs from the expected one
    Mismatch,
    /// No live value (missing or expired); nothing was written
    Absent,
}

/// TTL-bounded key-value store shared by all in-flight requests
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert or overwrite `key`, setting its expiry to now + `ttl`
    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// Live value for `key`, or `None` if missing or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Time left before `key` expires, or `None` if missing or expired
    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Remove `key`; a missing key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically replace the live value of `key` with `new` if it currently
    /// equals `expected`.
    ///
    /// The rewrite keeps the entry's remaining TTL exactly. An entry that is
    /// missing or has already expired is left alone and reported as
    /// [`CasOutcome::Absent`].
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: String,
    ) -> StoreResult<CasOutcome>;
}

/// Running store plus the handle needed to stop its background work
pub struct StoreHandle {
    pub store: Arc<dyn EntryStore>,
    sweeper: Option<memory::SweeperHandle>,
}

impl StoreHandle {
    /// Stop background maintenance (no-op for external backends)
    pub async fn shutdown(self) {
        if let Some(sweeper) = self.sweeper {
            sweeper.stop().await;
        }
    }
}

/// Build the configured store variant
pub async fn build_store(config: &Config) -> anyhow::Result<StoreHandle> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            let sweeper =
                store.start_cleanup(Duration::from_secs(config.cleanup_interval_secs.max(1)));
            tracing::info!(
                "Entry store: in-memory (sweep every {}s)",
                config.cleanup_interval_secs.max(1)
            );
            Ok(StoreHandle {
                store: Arc::new(store),
                sweeper: Some(sweeper),
            })
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("storeBackend is \"redis\" but redisUrl is not set"))?;
            let store = RedisStore::connect(url).await?;
            tracing::info!("Entry store: redis");
            Ok(StoreHandle {
                store: Arc::new(store),
                sweeper: None,
            })
        }
    }
}
