//! Minimal HTML surfaces served by the gateway itself.
//!
//! The login, profile, and callback pages are thin shells; they talk to the
//! JSON endpoints (`/auth/check-login-session`, `/otp/*`, `/auth/session`)
//! for everything stateful.

use axum::response::Html;

pub async fn root() -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>SSO Gateway</title></head>\
         <body><h1>SSO Gateway</h1>\
         <p><a href=\"/login\">Sign in</a></p></body></html>",
    )
}

/// Login surface. Reads the pending handshake via `/auth/check-login-session`
/// and drives the OTP flow against `/otp/send` and `/otp/verify`.
pub async fn login() -> Html<&'static str> {
    Html(include_str!("pages/login.html"))
}

/// Landing page for sessions established without a delegated handshake.
pub async fn profile() -> Html<&'static str> {
    Html(include_str!("pages/profile.html"))
}

/// Local callback target used when exercising the handshake against the
/// gateway itself.
pub async fn callback() -> Html<&'static str> {
    Html(include_str!("pages/callback.html"))
}
