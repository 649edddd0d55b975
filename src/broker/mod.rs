//! The cross-application login handshake.
//!
//! `initiate` validates the caller against the app registry, persists a
//! pending-login record under a random session id, and hands the caller the
//! cookie material for the redirect to the login surface. `resolve` consumes
//! the record (single-use, enforced by atomic read-and-delete); a session id
//! that does not resolve (expired, consumed, or never issued) is plain
//! absence.

use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::registry::AppRegistry;
use crate::store::{StateStore, StoreError};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

const LOGIN_PREFIX: &str = "login:";

pub const PENDING_TTL: Duration = Duration::from_secs(600);

/// One in-flight handshake, stored as JSON under `login:{session_id}`.
/// `return_url` is already validated against the app's allow-list; `state` is
/// the CSRF token the originating app checks on the return leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub app_id: String,
    pub return_url: String,
    pub state: String,
}

/// Result of a successful `initiate`: the cookie correlator plus the record
/// it points at.
#[derive(Clone, Debug)]
pub struct Initiated {
    pub session_id: String,
    pub pending: PendingLogin,
}

#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("app_id or return_url missing")]
    MissingParameters,
    #[error("unknown app_id")]
    InvalidApp,
    #[error("return_url is malformed or not allow-listed")]
    InvalidReturnUrl,
    #[error("rate limited")]
    RateLimited,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct LoginBroker {
    registry: Arc<dyn AppRegistry>,
    store: Arc<dyn StateStore>,
    limiter: Arc<dyn RateLimiter>,
    pending_ttl: Duration,
}

impl LoginBroker {
    #[must_use]
    pub fn new(
        registry: Arc<dyn AppRegistry>,
        store: Arc<dyn StateStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            registry,
            store,
            limiter,
            pending_ttl: PENDING_TTL,
        }
    }

    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Start a delegated login for `app_id`.
    ///
    /// `client_key` is the rate-limit identity (client-reported IP). Ordering
    /// matters: the limiter runs before any validation so invalid requests
    /// also consume budget.
    ///
    /// # Errors
    /// `RateLimited`, `MissingParameters`, `InvalidApp`, `InvalidReturnUrl`,
    /// or `Store` on infrastructure failure.
    pub async fn initiate(
        &self,
        app_id: Option<&str>,
        return_url: Option<&str>,
        client_key: &str,
    ) -> Result<Initiated, InitiateError> {
        if self.limiter.allow(client_key).await == RateLimitDecision::Limited {
            return Err(InitiateError::RateLimited);
        }

        let (Some(app_id), Some(return_url)) = (app_id, return_url) else {
            return Err(InitiateError::MissingParameters);
        };

        if self.registry.lookup(app_id).is_none() {
            return Err(InitiateError::InvalidApp);
        }

        if !well_formed_return_url(return_url) {
            return Err(InitiateError::InvalidReturnUrl);
        }
        if !self.registry.is_allowed_redirect(app_id, return_url) {
            return Err(InitiateError::InvalidReturnUrl);
        }

        let pending = PendingLogin {
            app_id: app_id.to_string(),
            return_url: return_url.to_string(),
            state: random_token()?,
        };
        let session_id = random_token()?;

        let value = serde_json::to_string(&pending)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        self.store
            .put(&format!("{LOGIN_PREFIX}{session_id}"), &value, self.pending_ttl)
            .await?;

        info!(action = "initiate", app_id = %app_id, ip = %client_key, "login handshake started");

        Ok(Initiated { session_id, pending })
    }

    /// Read the pending record without consuming it (the login surface uses
    /// this to learn which app the session belongs to).
    ///
    /// # Errors
    /// Only on store infrastructure failure.
    pub async fn pending(&self, session_id: &str) -> Result<Option<PendingLogin>, StoreError> {
        let Some(raw) = self.store.get(&format!("{LOGIN_PREFIX}{session_id}")).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    /// Consume the pending record with one atomic read-and-delete, so
    /// resolution happens at most once per handshake even when two callers
    /// race on the same session id.
    ///
    /// # Errors
    /// Only on store infrastructure failure.
    pub async fn resolve(&self, session_id: &str) -> Result<Option<PendingLogin>, StoreError> {
        let Some(raw) = self
            .store
            .take(&format!("{LOGIN_PREFIX}{session_id}"))
            .await?
        else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }
}

/// Absolute URL with an http or https scheme. Allow-list matching happens
/// separately; this only rejects garbage and exotic schemes early.
fn well_formed_return_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

/// 32 bytes from the OS entropy source, rendered as 64 lowercase hex chars.
/// Used for both the session id and the CSRF state token.
fn random_token() -> Result<String, StoreError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| StoreError::Unavailable(format!("entropy source failed: {err}")))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::{MemorySlidingWindow, NoopRateLimiter};
    use crate::registry::{AppConfig, StaticRegistry};
    use crate::store::MemoryStore;

    const CALLBACK: &str = "https://app1.company.com/auth/callback";

    fn registry() -> Arc<StaticRegistry> {
        Arc::new(StaticRegistry::new(vec![AppConfig {
            app_id: "app1".to_string(),
            name: "Application 1".to_string(),
            allowed_redirect_urls: vec![CALLBACK.to_string()],
            allowed_origins: vec!["https://app1.company.com".to_string()],
        }]))
    }

    fn broker() -> LoginBroker {
        LoginBroker::new(
            registry(),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopRateLimiter),
        )
    }

    #[tokio::test]
    async fn absent_parameters_are_rejected() {
        let broker = broker();
        let result = broker.initiate(None, Some(CALLBACK), "1.2.3.4").await;
        assert!(matches!(result, Err(InitiateError::MissingParameters)));
        let result = broker.initiate(Some("app1"), None, "1.2.3.4").await;
        assert!(matches!(result, Err(InitiateError::MissingParameters)));
    }

    #[tokio::test]
    async fn unknown_app_is_rejected_regardless_of_url() {
        let broker = broker();
        let result = broker.initiate(Some("app2"), Some(CALLBACK), "1.2.3.4").await;
        assert!(matches!(result, Err(InitiateError::InvalidApp)));
    }

    #[tokio::test]
    async fn return_url_must_match_allow_list_exactly() {
        let broker = broker();
        for url in [
            "https://app1.company.com/other",          // same origin, other path
            "http://app1.company.com/auth/callback",   // scheme mismatch
            "https://evil.example.com/auth/callback",  // other host
            "javascript:alert(1)",                     // exotic scheme
            "not a url",
            "/auth/callback", // relative
        ] {
            let result = broker.initiate(Some("app1"), Some(url), "1.2.3.4").await;
            assert!(
                matches!(result, Err(InitiateError::InvalidReturnUrl)),
                "expected rejection for {url}"
            );
        }
    }

    #[tokio::test]
    async fn initiate_persists_resolvable_pending_state() -> anyhow::Result<()> {
        let broker = broker();
        let initiated = broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await?;

        assert_eq!(initiated.session_id.len(), 64);
        assert_eq!(initiated.pending.state.len(), 64);
        assert!(initiated.pending.state.chars().all(|c| c.is_ascii_hexdigit()));

        let pending = broker.pending(&initiated.session_id).await?.expect("pending");
        assert_eq!(pending, initiated.pending);
        assert_eq!(pending.app_id, "app1");
        assert_eq!(pending.return_url, CALLBACK);

        // A non-consuming read leaves the record in place.
        assert!(broker.pending(&initiated.session_id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn resolve_is_single_use() -> anyhow::Result<()> {
        let broker = broker();
        let initiated = broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await?;

        let resolved = broker.resolve(&initiated.session_id).await?;
        assert_eq!(resolved, Some(initiated.pending));
        assert_eq!(broker.resolve(&initiated.session_id).await?, None);
        assert_eq!(broker.pending(&initiated.session_id).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn racing_resolutions_consume_exactly_once() -> anyhow::Result<()> {
        let broker = broker();
        let initiated = broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await?;

        let (first, second) = tokio::join!(
            broker.resolve(&initiated.session_id),
            broker.resolve(&initiated.session_id),
        );
        let resolved = [first?, second?].into_iter().flatten().count();
        assert_eq!(resolved, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_session_id_is_absence_not_error() -> anyhow::Result<()> {
        let broker = broker();
        assert_eq!(broker.resolve("0".repeat(64).as_str()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn session_and_state_tokens_differ() -> anyhow::Result<()> {
        let broker = broker();
        let initiated = broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await?;
        assert_ne!(initiated.session_id, initiated.pending.state);
        Ok(())
    }

    #[tokio::test]
    async fn rate_limit_applies_per_key() -> anyhow::Result<()> {
        let broker = LoginBroker::new(
            registry(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySlidingWindow::new(10, Duration::from_secs(60))),
        );
        for _ in 0..10 {
            broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await?;
        }
        let result = broker.initiate(Some("app1"), Some(CALLBACK), "1.2.3.4").await;
        assert!(matches!(result, Err(InitiateError::RateLimited)));
        // A different key is unaffected.
        assert!(broker.initiate(Some("app1"), Some(CALLBACK), "5.6.7.8").await.is_ok());
        Ok(())
    }

    #[test]
    fn url_shape_check() {
        assert!(well_formed_return_url("https://a.example.com/x"));
        assert!(well_formed_return_url("http://localhost:3001/auth/callback"));
        assert!(!well_formed_return_url("ftp://a.example.com/x"));
        assert!(!well_formed_return_url("//a.example.com/x"));
        assert!(!well_formed_return_url(""));
    }
}
