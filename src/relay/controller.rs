//! Token lifecycle controller
//!
//! Implements the not_found → pending/ready → consumed state machine on top
//! of an [`EntryStore`]. Records live under `token:{state}` for a fixed TTL
//! window from the moment they are stored; consuming one never extends that
//! window.

use std::sync::Arc;
use std::time::Duration;

use crate::common::fingerprint;
use crate::store::{CasOutcome, EntryStore, StoreResult};

use super::types::{TokenRecord, TokenStatus};

/// Default record lifetime
pub const TOKEN_TTL_SECS: u64 = 300;

/// Rounds of read / compare-and-swap before a consume gives up
const MAX_CONSUME_ATTEMPTS: usize = 3;

fn token_key(state: &str) -> String {
    format!("token:{}", state)
}

/// Token hand-off controller
pub struct TokenLifecycle {
    store: Arc<dyn EntryStore>,
    ttl: Duration,
}

impl TokenLifecycle {
    pub fn with_ttl(store: Arc<dyn EntryStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a record under `state` with a full TTL window
    pub async fn store(&self, state: &str, record: &TokenRecord) -> StoreResult<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))?;
        self.store.put(&token_key(state), raw, self.ttl).await
    }

    /// Current status of `state`, without consuming it
    pub async fn status(&self, state: &str) -> TokenStatus {
        let status = match self.load(state).await {
            Some((_, record)) => record.status(),
            None => TokenStatus::NotFound,
        };
        tracing::debug!(
            state = %fingerprint(state),
            "Status check: {}",
            status.as_str()
        );
        status
    }

    /// One-time retrieval
    ///
    /// Returns the record together with [`TokenStatus::Ready`] to exactly one
    /// caller per stored record. Later (or concurrent, losing) callers see
    /// [`TokenStatus::Consumed`]. The consumed marker is written back with the
    /// entry's remaining TTL; an entry that expires mid-way is left to vanish.
    pub async fn consume(&self, state: &str) -> (Option<TokenRecord>, TokenStatus) {
        let key = token_key(state);

        for _ in 0..MAX_CONSUME_ATTEMPTS {
            let Some((raw, record)) = self.load(state).await else {
                return (None, TokenStatus::NotFound);
            };

            match record.status() {
                TokenStatus::Ready => {}
                other => return (None, other),
            }

            match self.store.remaining_ttl(&key).await {
                Ok(Some(_)) => {}
                Ok(None) => return (None, TokenStatus::NotFound),
                Err(e) => {
                    tracing::warn!(state = %fingerprint(state), "Store unavailable while consuming: {}", e);
                    return (None, TokenStatus::NotFound);
                }
            }

            let mut spent = record;
            spent.consumed = true;
            let spent_raw = match serde_json::to_string(&spent) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!("Failed to encode consumed record: {}", e);
                    return (None, TokenStatus::NotFound);
                }
            };

            match self.store.compare_and_swap(&key, &raw, spent_raw).await {
                Ok(CasOutcome::Swapped) => {
                    tracing::info!(state = %fingerprint(state), "Token consumed");
                    return (Some(spent), TokenStatus::Ready);
                }
                // Someone else changed the record first; re-read and re-evaluate
                Ok(CasOutcome::Mismatch) => continue,
                Ok(CasOutcome::Absent) => return (None, TokenStatus::NotFound),
                Err(e) => {
                    tracing::warn!(state = %fingerprint(state), "Store unavailable while consuming: {}", e);
                    return (None, TokenStatus::NotFound);
                }
            }
        }

        tracing::warn!(
            state = %fingerprint(state),
            "Gave up consuming after {} contended attempts",
            MAX_CONSUME_ATTEMPTS
        );
        (None, TokenStatus::NotFound)
    }

    /// Read and decode the live record for `state`
    ///
    /// Store outages and undecodable values both read as absent, so an
    /// ambiguous read can never be reported as ready.
    async fn load(&self, state: &str) -> Option<(String, TokenRecord)> {
        let key = token_key(state);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(state = %fingerprint(state), "Store unavailable, reporting not_found: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) => Some((raw, record)),
            Err(e) => {
                tracing::warn!(state = %fingerprint(state), "Discarding undecodable record: {}", e);
                if let Err(e) = self.store.delete(&key).await {
                    tracing::warn!("Failed to delete undecodable record: {}", e);
                }
                None
            }
        }
    }
}
