//! OTP issuance and verification.
//!
//! One live code per recipient: a new send overwrites the previous record
//! (supersession, not coexistence). Verification is attempt-limited; the
//! attempt check runs before the existence check so an exhausted brute-force
//! client learns nothing about whether a code is outstanding.

use crate::store::{StateStore, StoreError};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

mod delivery;

pub use delivery::{DeliveryError, HttpOtpSender, LogOtpSender, OtpSender};

const OTP_PREFIX: &str = "otp:";
const ATTEMPT_PREFIX: &str = "otp_attempts:";

pub const OTP_TTL: Duration = Duration::from_secs(300);
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    /// Parse the wire value (`"email"` / `"sms"`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Sms => write!(f, "sms"),
        }
    }
}

/// One issued code, stored as JSON under `otp:{recipient}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtpRecord {
    pub code: String,
    pub recipient: String,
    pub channel: Channel,
    pub created_at: u64,
}

#[derive(Debug, Error)]
pub enum OtpSendError {
    #[error("invalid recipient for channel {0}")]
    InvalidRecipient(Channel),
    #[error("no delivery mechanism configured for external OTP")]
    ChannelUnconfigured,
    #[error(transparent)]
    DeliveryFailed(#[from] DeliveryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a verification attempt. Failure reasons are ordered and
/// short-circuiting; see [`OtpEngine::verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    TooManyAttempts,
    ExpiredOrNotFound,
    WrongCode { remaining: u32 },
}

pub struct OtpEngine {
    store: Arc<dyn StateStore>,
    sender: Option<Arc<dyn OtpSender>>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpEngine {
    /// `sender` is `None` when the external provider is selected but no
    /// service URL is configured; `send` then fails with
    /// [`OtpSendError::ChannelUnconfigured`].
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, sender: Option<Arc<dyn OtpSender>>) -> Self {
        Self {
            store,
            sender,
            ttl: OTP_TTL,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Generate, store, and dispatch a code for `recipient`.
    ///
    /// A fresh send supersedes any outstanding code for the recipient and
    /// clears its stale attempt counter: the old code is unusable from this
    /// point, so keeping its failure count would only lock out the
    /// legitimate user.
    ///
    /// # Errors
    /// `InvalidRecipient` when the format check for the channel fails,
    /// `ChannelUnconfigured` when no sender is wired, `DeliveryFailed` when
    /// the sender reports an error, `Store` on infrastructure failure.
    pub async fn send(
        &self,
        recipient: &str,
        channel: Channel,
    ) -> Result<OtpRecord, OtpSendError> {
        if !valid_recipient(recipient, channel) {
            return Err(OtpSendError::InvalidRecipient(channel));
        }
        let Some(sender) = &self.sender else {
            return Err(OtpSendError::ChannelUnconfigured);
        };

        let record = OtpRecord {
            code: generate_code(),
            recipient: recipient.to_string(),
            channel,
            created_at: now_unix_seconds(),
        };
        let value = serde_json::to_string(&record)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        self.store
            .put(&format!("{OTP_PREFIX}{recipient}"), &value, self.ttl)
            .await?;
        self.store
            .delete(&format!("{ATTEMPT_PREFIX}{recipient}"))
            .await?;

        // Never retried: a duplicate dispatch would deliver twice.
        sender.send(recipient, channel, &record.code).await?;

        info!(recipient = %recipient, channel = %channel, "otp issued");
        Ok(record)
    }

    /// Verify `code` for `recipient`.
    ///
    /// Checks run in order and short-circuit:
    /// 1. attempt counter at the cap → `TooManyAttempts`, record untouched;
    /// 2. no outstanding record → `ExpiredOrNotFound`;
    /// 3. code mismatch → counter incremented → `WrongCode { remaining }`;
    /// 4. match → record and counter deleted → `Valid`, exactly once.
    ///
    /// Two concurrent wrong-code calls may race on the increment; the counter
    /// is at-least-once and may overshoot by one in-flight collision, which is
    /// acceptable for a coarse abuse cap.
    ///
    /// # Errors
    /// Only on store infrastructure failure; every negative verification
    /// outcome is an ordinary [`VerifyOutcome`].
    pub async fn verify(&self, recipient: &str, code: &str) -> Result<VerifyOutcome, StoreError> {
        let otp_key = format!("{OTP_PREFIX}{recipient}");
        let attempt_key = format!("{ATTEMPT_PREFIX}{recipient}");

        let attempts = match self.store.get(&attempt_key).await? {
            Some(raw) => raw.parse::<u32>().unwrap_or(0),
            None => 0,
        };
        if attempts >= self.max_attempts {
            return Ok(VerifyOutcome::TooManyAttempts);
        }

        let Some(raw) = self.store.get(&otp_key).await? else {
            return Ok(VerifyOutcome::ExpiredOrNotFound);
        };
        let record: OtpRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                // A corrupt record is unusable; treat as absent and drop it.
                error!(recipient = %recipient, "corrupt otp record: {err}");
                self.store.delete(&otp_key).await?;
                return Ok(VerifyOutcome::ExpiredOrNotFound);
            }
        };

        if record.code != code {
            // The counter lives exactly as long as the code it guards: new
            // counters inherit the OTP record's remaining TTL, increments
            // keep the counter's own remaining TTL.
            let ttl = if attempts == 0 {
                self.store.remaining_ttl(&otp_key).await?
            } else {
                match self.store.remaining_ttl(&attempt_key).await? {
                    Some(ttl) => Some(ttl),
                    None => self.store.remaining_ttl(&otp_key).await?,
                }
            };
            // A TTL reading absent here means the record (and counter)
            // expired between the read above and now; report absence rather
            // than arm a counter that would outlive the code.
            let Some(ttl) = ttl else {
                return Ok(VerifyOutcome::ExpiredOrNotFound);
            };
            self.store
                .put(&attempt_key, &(attempts + 1).to_string(), ttl)
                .await?;
            return Ok(VerifyOutcome::WrongCode {
                remaining: self.max_attempts - attempts - 1,
            });
        }

        self.store.delete(&otp_key).await?;
        self.store.delete(&attempt_key).await?;
        info!(recipient = %recipient, "otp verified");
        Ok(VerifyOutcome::Valid)
    }
}

/// Uniform 6-digit code; the range keeps a leading non-zero digit so the
/// rendered string is always exactly 6 characters.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Format check per channel: standard mailbox grammar for email, `+`-prefixed
/// E.164 digits for sms.
#[must_use]
pub fn valid_recipient(recipient: &str, channel: Channel) -> bool {
    let pattern = match channel {
        Channel::Email => r"^[^\s@]+@[^\s@]+\.[^\s@]+$",
        Channel::Sms => r"^\+[1-9]\d{1,14}$",
    };
    Regex::new(pattern).is_ok_and(|regex| regex.is_match(recipient))
}

fn now_unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSender {
        sent: AtomicU32,
        fail: bool,
    }

    impl CountingSender {
        fn new(fail: bool) -> Self {
            Self {
                sent: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl OtpSender for CountingSender {
        async fn send(
            &self,
            _recipient: &str,
            _channel: Channel,
            _code: &str,
        ) -> Result<(), DeliveryError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 502,
                    detail: "downstream unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn engine() -> OtpEngine {
        OtpEngine::new(
            Arc::new(MemoryStore::new()),
            Some(Arc::new(CountingSender::new(false))),
        )
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.parse::<u32>().is_ok());
        }
    }

    #[test]
    fn recipient_validation_per_channel() {
        assert!(valid_recipient("a@example.com", Channel::Email));
        assert!(!valid_recipient("not-an-email", Channel::Email));
        assert!(!valid_recipient("a b@example.com", Channel::Email));
        assert!(valid_recipient("+14155552671", Channel::Sms));
        assert!(!valid_recipient("14155552671", Channel::Sms));
        assert!(!valid_recipient("+0123", Channel::Sms));
        assert!(!valid_recipient("+1", Channel::Sms));
        assert!(!valid_recipient("a@example.com", Channel::Sms));
    }

    #[tokio::test]
    async fn round_trip_is_single_use() -> anyhow::Result<()> {
        let engine = engine();
        let record = engine.send("a@example.com", Channel::Email).await?;
        assert_eq!(
            engine.verify("a@example.com", &record.code).await?,
            VerifyOutcome::Valid
        );
        // Consumed: the same code no longer verifies.
        assert_eq!(
            engine.verify("a@example.com", &record.code).await?,
            VerifyOutcome::ExpiredOrNotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_counts_down_remaining() -> anyhow::Result<()> {
        let engine = engine();
        let record = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if record.code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::WrongCode { remaining: 4 }
        );
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::WrongCode { remaining: 3 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn exhaustion_blocks_even_the_correct_code() -> anyhow::Result<()> {
        let engine = engine();
        let record = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if record.code == "000000" { "111111" } else { "000000" };
        for _ in 0..5 {
            engine.verify("a@example.com", wrong).await?;
        }
        // Sixth attempt with the correct code still fails.
        assert_eq!(
            engine.verify("a@example.com", &record.code).await?,
            VerifyOutcome::TooManyAttempts
        );
        Ok(())
    }

    #[tokio::test]
    async fn attempts_checked_before_existence() -> anyhow::Result<()> {
        let engine = engine();
        let record = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if record.code == "000000" { "111111" } else { "000000" };
        for _ in 0..5 {
            engine.verify("a@example.com", wrong).await?;
        }
        engine.store.delete("otp:a@example.com").await?;
        // With the record gone, the exhausted counter still answers first, so
        // existence is not leaked.
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::TooManyAttempts
        );
        Ok(())
    }

    #[tokio::test]
    async fn attempt_counter_expires_with_the_code() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let engine = OtpEngine::new(store.clone(), Some(Arc::new(CountingSender::new(false))))
            .with_ttl(Duration::from_millis(100));
        let record = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if record.code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::WrongCode { remaining: 4 }
        );

        // The fresh counter inherited the record's remaining TTL, not the
        // full default.
        let otp_ttl = store.remaining_ttl("otp:a@example.com").await?.expect("otp ttl");
        let counter_ttl = store
            .remaining_ttl("otp_attempts:a@example.com")
            .await?
            .expect("counter ttl");
        assert!(counter_ttl <= otp_ttl + Duration::from_millis(10));
        assert!(counter_ttl <= Duration::from_millis(100));

        // Past the TTL both are gone: absence, not a stale counter verdict.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::ExpiredOrNotFound
        );
        assert_eq!(store.get("otp_attempts:a@example.com").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn expiry_during_verify_reads_as_absent() -> anyhow::Result<()> {
        // remaining_ttl answering absence while the record is still readable
        // is the expiry race; no counter may be armed past the code's life.
        struct NoTtlStore(MemoryStore);

        #[async_trait::async_trait]
        impl StateStore for NoTtlStore {
            async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
                self.0.put(key, value, ttl).await
            }
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
                self.0.get(key).await
            }
            async fn delete(&self, key: &str) -> Result<(), StoreError> {
                self.0.delete(key).await
            }
            async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
                self.0.take(key).await
            }
            async fn remaining_ttl(&self, _key: &str) -> Result<Option<Duration>, StoreError> {
                Ok(None)
            }
            async fn ping(&self) -> Result<(), StoreError> {
                self.0.ping().await
            }
        }

        let store = Arc::new(NoTtlStore(MemoryStore::new()));
        let engine = OtpEngine::new(store.clone(), Some(Arc::new(CountingSender::new(false))));
        let record = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if record.code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            engine.verify("a@example.com", wrong).await?,
            VerifyOutcome::ExpiredOrNotFound
        );
        assert_eq!(store.get("otp_attempts:a@example.com").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn new_send_supersedes_and_resets_attempts() -> anyhow::Result<()> {
        let engine = engine();
        let first = engine.send("a@example.com", Channel::Email).await?;
        let wrong = if first.code == "000000" { "111111" } else { "000000" };
        for _ in 0..5 {
            engine.verify("a@example.com", wrong).await?;
        }
        let second = engine.send("a@example.com", Channel::Email).await?;
        // Old code is superseded, counter was reset on reissue.
        if first.code != second.code {
            assert_ne!(
                engine.verify("a@example.com", &first.code).await?,
                VerifyOutcome::Valid
            );
        }
        assert_eq!(
            engine.verify("a@example.com", &second.code).await?,
            VerifyOutcome::Valid
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_dispatch() {
        let sender = Arc::new(CountingSender::new(false));
        let engine = OtpEngine::new(Arc::new(MemoryStore::new()), Some(sender.clone()));
        let result = engine.send("not-an-email", Channel::Email).await;
        assert!(matches!(result, Err(OtpSendError::InvalidRecipient(_))));
        assert_eq!(sender.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_channel_is_reported() {
        let engine = OtpEngine::new(Arc::new(MemoryStore::new()), None);
        let result = engine.send("a@example.com", Channel::Email).await;
        assert!(matches!(result, Err(OtpSendError::ChannelUnconfigured)));
    }

    #[tokio::test]
    async fn delivery_failure_is_surfaced() {
        let engine = OtpEngine::new(
            Arc::new(MemoryStore::new()),
            Some(Arc::new(CountingSender::new(true))),
        );
        let result = engine.send("a@example.com", Channel::Email).await;
        assert!(matches!(
            result,
            Err(OtpSendError::DeliveryFailed(DeliveryError::Rejected { status: 502, .. }))
        ));
    }

    #[tokio::test]
    async fn verify_without_send_is_not_found() -> anyhow::Result<()> {
        let engine = engine();
        assert_eq!(
            engine.verify("a@example.com", "123456").await?,
            VerifyOutcome::ExpiredOrNotFound
        );
        Ok(())
    }
}
