use crate::api::{self, GatewayConfig, GatewayState};
use crate::broker::LoginBroker;
use crate::cli::actions::{Action, OtpProvider};
use crate::identity::StoreIdentity;
use crate::limiter::{NoopRateLimiter, RateLimiter, RedisSlidingWindow};
use crate::otp::{HttpOtpSender, LogOtpSender, OtpEngine, OtpSender};
use crate::registry::StaticRegistry;
use crate::store::{RedisStore, StateStore};
use anyhow::{Context, Result};
use std::{fs, sync::Arc, time::Duration};
use tracing::{info, warn};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        redis_url,
        apps_file,
        public_url,
        ratelimit_url,
        ratelimit_requests,
        ratelimit_window,
        otp_provider,
        otp_service_url,
        otp_service_token,
        otp_reveal_codes,
    } = action;

    let apps = fs::read_to_string(&apps_file)
        .with_context(|| format!("Failed to read apps file {}", apps_file.display()))?;
    let registry = Arc::new(
        StaticRegistry::from_json(&apps)
            .with_context(|| format!("Failed to parse apps file {}", apps_file.display()))?,
    );
    if registry.is_empty() {
        warn!("App registry is empty; every /auth/initiate will be rejected");
    }
    info!(apps = registry.len(), "Loaded app registry");

    let store: Arc<dyn StateStore> = Arc::new(
        RedisStore::connect(&redis_url)
            .await
            .context("Failed to connect to the state store")?,
    );

    let limiter: Arc<dyn RateLimiter> = match ratelimit_url {
        Some(url) => Arc::new(
            RedisSlidingWindow::connect(
                &url,
                ratelimit_requests,
                Duration::from_secs(ratelimit_window),
            )
            .await
            .context("Failed to connect to the rate limit store")?,
        ),
        None => {
            warn!("Rate limiting disabled: no --ratelimit-url configured");
            Arc::new(NoopRateLimiter)
        }
    };

    // The mock sender logs codes; only it may echo them back to the client.
    let (sender, reveal_codes): (Option<Arc<dyn OtpSender>>, bool) = match otp_provider {
        OtpProvider::Mock => (Some(Arc::new(LogOtpSender)), otp_reveal_codes),
        OtpProvider::External => match otp_service_url {
            Some(url) => (
                Some(Arc::new(HttpOtpSender::new(url, otp_service_token)?)),
                false,
            ),
            None => {
                warn!("External OTP provider selected without --otp-service-url; sends will fail");
                (None, false)
            }
        },
    };

    let broker = LoginBroker::new(registry.clone(), store.clone(), limiter);
    let otp = OtpEngine::new(store.clone(), sender);
    let identity = Arc::new(StoreIdentity::new(store.clone()));

    let config = GatewayConfig::new(public_url).with_reveal_codes(reveal_codes);
    let state = Arc::new(GatewayState::new(
        config, registry, store, broker, otp, identity,
    ));

    api::new(port, state).await
}
