//! Redis-backed implementation of [`StateStore`].

use super::{STORE_TIMEOUT, StateStore, StoreError};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// [`StateStore`] over a shared Redis connection manager.
///
/// The manager multiplexes one connection and reconnects on failure; clones
/// are cheap handles to the same backend.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and build the store.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the initial connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(Self { connection })
    }

    #[must_use]
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

/// Map a TTL reply to the trait's remaining-TTL contract. Redis answers -2
/// for a missing key and -1 for a key that exists without an expiry; every
/// key this store writes carries one, so -1 means the key was written by
/// something else and is surfaced as an error rather than read as absence.
fn ttl_from_seconds(key: &str, seconds: i64) -> Result<Option<Duration>, StoreError> {
    match seconds {
        -2 => Ok(None),
        s if s < 0 => Err(StoreError::Unavailable(format!(
            "key {key} exists without an expiry"
        ))),
        s => Ok(Some(Duration::from_secs(s.unsigned_abs()))),
    }
}

/// Bound a store round-trip by [`STORE_TIMEOUT`] and normalize errors.
async fn bounded<T, F>(future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, redis::RedisError>>,
{
    match timeout(STORE_TIMEOUT, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(StoreError::Unavailable(err.to_string())),
        Err(_) => Err(StoreError::Timeout),
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        // SET .. EX: expiry is enforced by Redis, not by this process.
        let seconds = ttl.as_secs().max(1);
        bounded(async move {
            let _: () = connection.set_ex(key, value, seconds).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        bounded(async move {
            let value: Option<String> = connection.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        bounded(async move {
            let _: () = connection.del(key).await?;
            Ok(())
        })
        .await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        // GETDEL: read and delete in one server-side step.
        bounded(async move {
            let value: Option<String> = connection.get_del(key).await?;
            Ok(value)
        })
        .await
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut connection = self.connection.clone();
        let seconds: i64 = bounded(async move {
            let seconds: i64 = connection.ttl(key).await?;
            Ok(seconds)
        })
        .await?;
        ttl_from_seconds(key, seconds)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        bounded(async move {
            let _: String = redis::cmd("PING").query_async(&mut connection).await?;
            Ok(())
        })
        .await
    }
}
