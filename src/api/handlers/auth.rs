//! Handshake and session endpoints.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::types::{
    ErrorResponse, InitiateQuery, LogoutResponse, PendingSessionResponse, SessionResponse,
    SessionUser,
};
use super::utils::{
    AUTH_COOKIE_NAME, LOGIN_COOKIE_NAME, build_cookie, clear_cookie, client_key, cookie_value,
};
use crate::api::state::GatewayState;
use crate::broker::InitiateError;

/// Start a delegated login for a registered app.
///
/// Validation order is fixed: rate limit, then parameter presence, then app,
/// then return URL shape and allow-list. On success the browser is redirected
/// to the login surface with the handshake correlator cookie set.
#[utoipa::path(
    get,
    path = "/auth/initiate",
    params(
        ("app_id" = Option<String>, Query, description = "Registered application id"),
        ("return_url" = Option<String>, Query, description = "Exact allow-listed return URL")
    ),
    responses(
        (status = 307, description = "Redirect to the login surface; sets the login_session cookie"),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn initiate(
    headers: HeaderMap,
    Query(query): Query<InitiateQuery>,
    state: Extension<Arc<GatewayState>>,
) -> impl IntoResponse {
    let key = client_key(&headers);

    match state
        .broker()
        .initiate(query.app_id.as_deref(), query.return_url.as_deref(), &key)
        .await
    {
        Ok(initiated) => {
            let secure = state.config().cookie_secure();
            let ttl = state.config().login_cookie_ttl_seconds();
            let cookie = match build_cookie(LOGIN_COOKIE_NAME, &initiated.session_id, ttl, secure) {
                Ok(cookie) => cookie,
                Err(err) => {
                    error!("Failed to build login cookie: {err}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Internal server error")),
                    )
                        .into_response();
                }
            };
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            (
                response_headers,
                Redirect::temporary(state.config().login_path()),
            )
                .into_response()
        }
        Err(InitiateError::MissingParameters) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing parameters")),
        )
            .into_response(),
        Err(InitiateError::InvalidApp) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid app_id")),
        )
            .into_response(),
        Err(InitiateError::InvalidReturnUrl) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid return_url")),
        )
            .into_response(),
        Err(InitiateError::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("Too many requests")),
        )
            .into_response(),
        Err(InitiateError::Store(err)) => {
            error!("Failed to persist pending login: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

/// Resolve the cookie-identified pending handshake for the login surface.
///
/// The UI learns which app and return URL this session belongs to from here,
/// never from client-supplied values.
#[utoipa::path(
    get,
    path = "/auth/check-login-session",
    responses(
        (status = 200, description = "Pending handshake", body = PendingSessionResponse),
        (status = 404, description = "No pending handshake for this browser")
    ),
    tag = "auth"
)]
pub async fn check_login_session(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
) -> impl IntoResponse {
    let Some(session_id) = cookie_value(&headers, LOGIN_COOKIE_NAME) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "session": null }))).into_response();
    };

    match state.broker().pending(&session_id).await {
        Ok(Some(pending)) => (
            StatusCode::OK,
            Json(PendingSessionResponse {
                app_id: pending.app_id,
                return_url: pending.return_url,
                state: pending.state,
            }),
        )
            .into_response(),
        // Expired, consumed, or never issued: plain absence.
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "session": null }))).into_response(),
        Err(err) => {
            error!("Failed to look up pending login: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

/// Report the authenticated session behind the `auth_token` cookie.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 401, description = "No active session", body = SessionResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
) -> impl IntoResponse {
    let Some(token) = cookie_value(&headers, AUTH_COOKIE_NAME) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse { user: None }),
        )
            .into_response();
    };

    match state.identity().resolve(&token).await {
        Ok(Some(subject)) => (
            StatusCode::OK,
            Json(SessionResponse {
                user: Some(SessionUser {
                    id: subject.id,
                    email: subject.email,
                    name: subject.name,
                }),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse { user: None }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

/// Terminate the authenticated session. Best-effort: the cookie is cleared
/// even when there was nothing to terminate; 500 only when termination
/// itself fails.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = LogoutResponse),
        (status = 500, description = "Termination failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    if let Some(token) = cookie_value(&headers, AUTH_COOKIE_NAME) {
        if let Err(err) = state.identity().terminate(&token).await {
            error!("Failed to terminate session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Logout failed")),
            )
                .into_response();
        }
    }

    info!(action = "logout", ip = %client_key(&headers), "session terminated");

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_cookie(AUTH_COOKIE_NAME, state.config().cookie_secure()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(LogoutResponse { success: true }),
    )
        .into_response()
}
