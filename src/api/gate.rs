//! Access gate for the gateway's own pages.
//!
//! Runs before routing as a middleware layer: pages that show account data
//! require the `auth_token` session, everything involved in obtaining one is
//! public. The gate redirects browsers instead of returning 401 because its
//! subjects are HTML pages, not API calls.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::handlers::utils::{AUTH_COOKIE_NAME, cookie_value};
use super::state::GatewayState;

/// Paths reachable without a session. The login flow, the JSON endpoints it
/// calls, health, and the API docs all have to work for anonymous browsers.
fn is_public(path: &str) -> bool {
    matches!(path, "/" | "/login" | "/callback" | "/health")
        || path.starts_with("/auth/")
        || path.starts_with("/otp/")
        || path.starts_with("/docs")
        || path.starts_with("/api-docs/")
}

pub async fn gate(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let authenticated = has_session(&state, request.headers()).await;

    // A signed-in browser has no business on the login page.
    if path == "/login" && authenticated {
        return Redirect::temporary(state.config().landing_path()).into_response();
    }

    if !is_public(&path) && !authenticated {
        return Redirect::temporary(state.config().login_path()).into_response();
    }

    next.run(request).await
}

async fn has_session(state: &GatewayState, headers: &HeaderMap) -> bool {
    let Some(token) = cookie_value(headers, AUTH_COOKIE_NAME) else {
        return false;
    };
    // A store error counts as no session; the protected page redirects
    // rather than serving data it cannot attribute.
    matches!(state.identity().resolve(&token).await, Ok(Some(_)))
}
