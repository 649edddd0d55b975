//! Gateway configuration and shared request state.

use crate::broker::LoginBroker;
use crate::identity::IdentityProvider;
use crate::otp::OtpEngine;
use crate::registry::AppRegistry;
use crate::store::StateStore;
use std::sync::Arc;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_LANDING_PATH: &str = "/profile";
const DEFAULT_LOGIN_COOKIE_TTL_SECONDS: u64 = 600;

/// Behavioral knobs of the gateway surface. TTLs and thresholds live on the
/// components; this carries what handlers need to build responses.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    public_base_url: String,
    login_path: String,
    landing_path: String,
    login_cookie_ttl_seconds: u64,
    reveal_codes: bool,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(public_base_url: String) -> Self {
        Self {
            public_base_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            login_cookie_ttl_seconds: DEFAULT_LOGIN_COOKIE_TTL_SECONDS,
            reveal_codes: false,
        }
    }

    /// Echo generated codes in `/otp/send` responses. Only honored by the
    /// mock provider wiring; never enable for real deployments.
    #[must_use]
    pub fn with_reveal_codes(mut self, reveal: bool) -> Self {
        self.reveal_codes = reveal;
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: String) -> Self {
        self.landing_path = path;
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn login_cookie_ttl_seconds(&self) -> u64 {
        self.login_cookie_ttl_seconds
    }

    #[must_use]
    pub fn reveal_codes(&self) -> bool {
        self.reveal_codes
    }

    /// Cookies are marked `Secure` when the gateway is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.public_base_url.starts_with("https://")
    }
}

/// Everything a request handler needs, shared via `Extension<Arc<_>>`.
pub struct GatewayState {
    config: GatewayConfig,
    registry: Arc<dyn AppRegistry>,
    store: Arc<dyn StateStore>,
    broker: LoginBroker,
    otp: OtpEngine,
    identity: Arc<dyn IdentityProvider>,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        registry: Arc<dyn AppRegistry>,
        store: Arc<dyn StateStore>,
        broker: LoginBroker,
        otp: OtpEngine,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            broker,
            otp,
            identity,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &dyn AppRegistry {
        self.registry.as_ref()
    }

    #[must_use]
    pub fn registry_handle(&self) -> Arc<dyn AppRegistry> {
        self.registry.clone()
    }

    #[must_use]
    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn broker(&self) -> &LoginBroker {
        &self.broker
    }

    #[must_use]
    pub fn otp(&self) -> &OtpEngine {
        &self.otp
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_secure_follows_scheme() {
        assert!(GatewayConfig::new("https://sso.company.com".to_string()).cookie_secure());
        assert!(!GatewayConfig::new("http://localhost:8080".to_string()).cookie_secure());
    }

    #[test]
    fn defaults_and_overrides() {
        let config = GatewayConfig::new("http://localhost:8080".to_string());
        assert_eq!(config.login_path(), "/login");
        assert_eq!(config.landing_path(), "/profile");
        assert_eq!(config.login_cookie_ttl_seconds(), 600);
        assert!(!config.reveal_codes());

        let config = config
            .with_reveal_codes(true)
            .with_landing_path("/home".to_string());
        assert!(config.reveal_codes());
        assert_eq!(config.landing_path(), "/home");
    }
}
