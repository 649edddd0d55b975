//! Delegated identity layer.
//!
//! The gateway never inspects the authenticated-session token's structure; it
//! only asks "is there a valid session" and "who is the subject". That seam is
//! [`IdentityProvider`]. The default implementation keeps sessions in the
//! ephemeral store under a hash of an opaque random token, so raw tokens never
//! touch the backend.

use crate::store::{StateStore, StoreError};
use async_trait::async_trait;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use ulid::Ulid;

const SESSION_PREFIX: &str = "auth:";

pub const SESSION_TTL: Duration = Duration::from_secs(3600);

/// The post-login identity the gateway hands back to apps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Mint a session for `email` and return the opaque token for the cookie.
    async fn establish(&self, email: &str) -> Result<String, StoreError>;

    /// Resolve a token to its subject; `None` for expired or unknown tokens.
    async fn resolve(&self, token: &str) -> Result<Option<Subject>, StoreError>;

    /// Terminate the session behind `token`. Terminating an absent session is
    /// not an error.
    async fn terminate(&self, token: &str) -> Result<(), StoreError>;
}

/// Store-backed sessions: opaque 64-hex tokens, SHA-256 hashed before use as
/// a store key, subject JSON as the value.
pub struct StoreIdentity {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl StoreIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            ttl: SESSION_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key_for(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{SESSION_PREFIX}{hex}")
    }
}

#[async_trait]
impl IdentityProvider for StoreIdentity {
    async fn establish(&self, email: &str) -> Result<String, StoreError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| StoreError::Unavailable(format!("entropy source failed: {err}")))?;
        let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();

        let subject = Subject {
            id: Ulid::new().to_string(),
            email: email.to_string(),
            name: None,
        };
        let value = serde_json::to_string(&subject)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        self.store.put(&Self::key_for(&token), &value, self.ttl).await?;

        info!(email = %email, "session established");
        Ok(token)
    }

    async fn resolve(&self, token: &str) -> Result<Option<Subject>, StoreError> {
        let Some(raw) = self.store.get(&Self::key_for(token)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    async fn terminate(&self, token: &str) -> Result<(), StoreError> {
        self.store.delete(&Self::key_for(token)).await
    }
}
