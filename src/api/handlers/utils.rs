//! Cookie and client-IP helpers shared by the handlers and the access gate.

use axum::http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};

/// Handshake correlator cookie, distinct from the authenticated-session
/// cookie: the first scopes one login flow, the second scopes the identity.
pub(crate) const LOGIN_COOKIE_NAME: &str = "login_session";
pub(crate) const AUTH_COOKIE_NAME: &str = "auth_token";

/// Read a cookie value from the `Cookie` header.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

/// Build an `HttpOnly`, `SameSite=Lax` cookie, `Secure` when requested.
pub(crate) fn build_cookie(
    name: &str,
    value: &str,
    max_age_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(name, "", 0, secure)
}

/// Extract a client IP for rate limiting from common proxy headers.
///
/// Spoofable by design; the limiter it feeds is a coarse guard, not a
/// security boundary.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rate-limit identity: client IP with a same-process fallback when absent.
pub(crate) fn client_key(headers: &HeaderMap) -> String {
    extract_client_ip(headers).unwrap_or_else(|| "anonymous".to_string())
}
