//! Static allow-list of client applications.
//!
//! Every app that may delegate login to the gateway is registered here with
//! the exact redirect URLs and origins it is allowed to use. Matching is
//! exact string comparison: no patterns, no prefixes, no normalization beyond
//! what the caller already performed. That closes the open-redirect class of
//! bugs that prefix/regex matching reintroduces, at the cost of registering
//! every legitimate target explicitly.

use serde::Deserialize;
use std::collections::HashMap;

/// Identity of a registered client application.
///
/// Loaded once at process start; never created or destroyed at runtime.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub app_id: String,
    pub name: String,
    pub allowed_redirect_urls: Vec<String>,
    pub allowed_origins: Vec<String>,
}

/// Read-only lookup interface over registered apps.
///
/// A trait so the broker does not care whether the registry is backed by a
/// config file, a database, or a remote service. Pure and synchronous; the
/// only failure mode is "not found".
pub trait AppRegistry: Send + Sync {
    fn lookup(&self, app_id: &str) -> Option<&AppConfig>;

    /// Exact-match check of `url` against the app's redirect allow-list.
    fn is_allowed_redirect(&self, app_id: &str, url: &str) -> bool {
        self.lookup(app_id)
            .is_some_and(|app| app.allowed_redirect_urls.iter().any(|u| u == url))
    }

    /// Exact-match check of `origin` against the app's origin allow-list.
    fn is_allowed_origin(&self, app_id: &str, origin: &str) -> bool {
        self.lookup(app_id)
            .is_some_and(|app| app.allowed_origins.iter().any(|o| o == origin))
    }

    /// True when any registered app lists `origin`. Feeds the CORS predicate.
    fn origin_registered(&self, origin: &str) -> bool;
}

/// In-memory registry loaded from a JSON file at startup.
#[derive(Clone, Debug, Default)]
pub struct StaticRegistry {
    apps: HashMap<String, AppConfig>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new(apps: Vec<AppConfig>) -> Self {
        Self {
            apps: apps
                .into_iter()
                .map(|app| (app.app_id.clone(), app))
                .collect(),
        }
    }

    /// Parse the registry from its JSON representation (the `--apps-file`
    /// format): a list of [`AppConfig`] objects.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let apps: Vec<AppConfig> = serde_json::from_str(json)?;
        Ok(Self::new(apps))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl AppRegistry for StaticRegistry {
    fn lookup(&self, app_id: &str) -> Option<&AppConfig> {
        self.apps.get(app_id)
    }

    fn origin_registered(&self, origin: &str) -> bool {
        self.apps
            .values()
            .any(|app| app.allowed_origins.iter().any(|o| o == origin))
    }
}
