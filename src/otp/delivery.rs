//! OTP delivery abstraction.
//!
//! The engine hands a generated code to an [`OtpSender`]; the sender decides
//! how to deliver (external HTTP service, or a log stub for local dev) and
//! returns `Ok`/`Err`. Delivery is never retried by the engine: a duplicate
//! send would deliver two different-looking messages for one code.

use super::Channel;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The external service answered with a non-success status.
    #[error("delivery service returned {status}: {detail}")]
    Rejected { status: u16, detail: String },
    /// The external service could not be reached.
    #[error("delivery request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait OtpSender: Send + Sync {
    /// Deliver `code` to `recipient` over `channel`.
    async fn send(&self, recipient: &str, channel: Channel, code: &str)
        -> Result<(), DeliveryError>;
}

/// Local dev sender that logs the code instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        code: &str,
    ) -> Result<(), DeliveryError> {
        info!(
            recipient = %recipient,
            channel = %channel,
            code = %code,
            "otp delivery stub"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct DeliveryRequest<'a> {
    recipient: &'a str,
    code: &'a str,
    channel: Channel,
}

/// Sender that POSTs the code to an external delivery service.
pub struct HttpOtpSender {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl HttpOtpSender {
    /// Build the sender.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: String, token: Option<SecretString>) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(crate::APP_USER_AGENT).build()?;
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl OtpSender for HttpOtpSender {
    async fn send(
        &self,
        recipient: &str,
        channel: Channel,
        code: &str,
    ) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.url).json(&DeliveryRequest {
            recipient,
            code,
            channel,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // Surface the upstream's reported detail where safe; body text is
        // truncated so a misbehaving service cannot flood responses.
        let detail = response.text().await.unwrap_or_default();
        let detail = detail.chars().take(200).collect();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}
