//! Redis-backed Entry Store
//!
//! Lets several relay instances share one token namespace. Expiry is
//! delegated to Redis key TTLs; the compare-and-swap runs as a Lua script so
//! the check and the TTL-preserving rewrite happen in one server-side step.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use super::{CasOutcome, EntryStore, StoreError, StoreResult};

/// Upper bound for a single Redis round-trip
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns 1 when swapped, 0 on mismatch, -1 when the key is gone.
/// The new value is written with the key's current PTTL, so the window is
/// never reset or extended.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
if current ~= ARGV[1] then
    return 0
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl <= 0 then
    return -1
end
redis.call('SET', KEYS[1], ARGV[2], 'PX', ttl)
return 1
"#;

/// Redis store client
pub struct RedisStore {
    connection_manager: ConnectionManager,
    cas_script: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)?;
        let connection_manager = bounded(ConnectionManager::new(client)).await?;

        Ok(Self {
            connection_manager,
            cas_script: Script::new(CAS_SCRIPT),
        })
    }
}

/// Apply [`OPERATION_TIMEOUT`] to a Redis call
async fn bounded<T, F>(fut: F) -> StoreResult<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(OPERATION_TIMEOUT)),
    }
}

/// Map a `PTTL` reply to a remaining duration (-2 missing, -1 no expiry)
fn pttl_to_remaining(pttl_ms: i64) -> Option<Duration> {
    if pttl_ms > 0 {
        Some(Duration::from_millis(pttl_ms as u64))
    } else {
        None
    }
}

fn cas_reply_to_outcome(reply: i64) -> StoreResult<CasOutcome> {
    match reply {
        1 => Ok(CasOutcome::Swapped),
        0 => Ok(CasOutcome::Mismatch),
        -1 => Ok(CasOutcome::Absent),
        other => Err(StoreError::Backend(format!(
            "unexpected compare-and-swap reply: {}",
            other
        ))),
    }
}

#[async_trait]
impl EntryStore for RedisStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_secs = ttl.as_secs().max(1);
        bounded(conn.set_ex::<_, _, ()>(key, value, ttl_secs)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.connection_manager.clone();
        let pttl: i64 = bounded(conn.pttl(key)).await?;
        Ok(pttl_to_remaining(pttl))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection_manager.clone();
        bounded(conn.del::<_, ()>(key)).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: String,
    ) -> StoreResult<CasOutcome> {
        let mut conn = self.connection_manager.clone();
        let mut invocation = self.cas_script.key(key);
        invocation.arg(expected).arg(new);
        let reply: i64 = bounded(invocation.invoke_async(&mut conn)).await?;
        cas_reply_to_outcome(reply)
    }
}
