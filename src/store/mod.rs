//! Ephemeral key/value store with per-key TTL.
//!
//! All shared mutable state (pending handshakes, OTP codes, attempt counters,
//! authenticated sessions) lives here; expiry is enforced by the store itself,
//! not by polling. Store unavailability degrades to an error the caller maps,
//! never a silent success with stale data, and never a process crash.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Upper bound on any single store round-trip. Callers surface failure
/// instead of hanging a request on a wedged backend.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("state store operation timed out")]
    Timeout,
}

/// TTL-bearing key/value store.
///
/// `get` on an expired, deleted, or never-written key returns `Ok(None)`;
/// absence is an ordinary negative result, not an error.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value and TTL.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read and delete `key` as one operation; `None` when absent. Two
    /// concurrent callers cannot both observe the value, which is what makes
    /// single-use consumption hold.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remaining TTL of `key`, or `None` when the key is absent.
    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Liveness probe for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
