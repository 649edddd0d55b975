//! # Enirejo (SSO Login Gateway)
//!
//! `enirejo` is a standalone single-sign-on gateway: registered client
//! applications delegate login to this service, which carries short-lived
//! handshake state through the login round-trip and hands a verified identity
//! back to the originating app. It is a relay and session broker, not an
//! identity source of truth.
//!
//! ## Cross-application handshake
//!
//! `GET /auth/initiate` validates the calling app and its return URL against a
//! static allow-list, persists a pending-login record under a random session
//! id (10 minute TTL), and redirects to the login surface with an `HttpOnly`
//! correlation cookie. After the user authenticates, the pending record is
//! consumed (single-use) and the browser is sent back to the validated return
//! URL. A session id that does not resolve (expired, consumed, or never
//! issued) is treated as absent, never as a distinct error.
//!
//! ## OTP login
//!
//! `POST /otp/send` issues a 6-digit code (5 minute TTL, one live code per
//! recipient; a new send supersedes the old one) and `POST /otp/verify`
//! checks it with bounded retries: five failed attempts block verification
//! until the counter expires or a fresh code is issued.
//!
//! ## State
//!
//! All mutable state (pending handshakes, OTP codes, attempt counters,
//! authenticated sessions) lives in an external TTL-bearing store (Redis).
//! The store is the sole synchronization point; request handlers hold no
//! locks and no in-process state.

pub mod api;
pub mod broker;
pub mod cli;
pub mod identity;
pub mod limiter;
pub mod otp;
pub mod registry;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
