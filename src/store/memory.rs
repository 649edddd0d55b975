//! In-process implementation of [`StateStore`] for tests and local runs.

use super::{StateStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Mutex'd map with lazy expiry. Same observable semantics as [`super::RedisStore`]
/// for a single process: expired keys read as absent and are dropped on access.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.lock()?;
        match entries.remove(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) => {
                let now = Instant::now();
                if entry.expires_at > now {
                    Ok(Some(entry.expires_at - now))
                } else {
                    entries.remove(key);
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_secs(60)).await?;
        assert_eq!(store.get("k").await?.as_deref(), Some("v"));
        store.delete("k").await?;
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_millis(20)).await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await?, None);
        assert_eq!(store.remaining_ttl("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn put_replaces_value_and_ttl() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "old", Duration::from_millis(20)).await?;
        store.put("k", "new", Duration::from_secs(60)).await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await?.as_deref(), Some("new"));
        Ok(())
    }

    #[tokio::test]
    async fn remaining_ttl_tracks_expiry() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_secs(300)).await?;
        let ttl = store.remaining_ttl("k").await?.expect("ttl present");
        assert!(ttl <= Duration::from_secs(300));
        assert!(ttl > Duration::from_secs(290));
        assert_eq!(store.remaining_ttl("missing").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_absent_key_is_ok() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.delete("missing").await?;
        Ok(())
    }

    #[tokio::test]
    async fn take_consumes_the_value() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_secs(60)).await?;
        assert_eq!(store.take("k").await?.as_deref(), Some("v"));
        assert_eq!(store.take("k").await?, None);
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn take_of_expired_key_is_absent() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_millis(20)).await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.take("k").await?, None);
        Ok(())
    }
}
