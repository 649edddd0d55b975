//! OTP issuance and verification endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use super::types::{
    ErrorResponse, OtpSendRequest, OtpSendResponse, OtpVerifyRequest, OtpVerifyResponse,
    VerifiedUser,
};
use super::utils::{
    AUTH_COOKIE_NAME, LOGIN_COOKIE_NAME, build_cookie, clear_cookie, cookie_value,
};
use crate::api::state::GatewayState;
use crate::identity::SESSION_TTL;
use crate::otp::{Channel, DeliveryError, OtpSendError, VerifyOutcome};

/// Issue a one-time code to a recipient.
#[utoipa::path(
    post,
    path = "/otp/send",
    request_body = OtpSendRequest,
    responses(
        (status = 200, description = "Code issued and dispatched", body = OtpSendResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Delivery channel unconfigured or store failure", body = ErrorResponse)
    ),
    tag = "otp"
)]
pub async fn send(
    state: Extension<Arc<GatewayState>>,
    payload: Option<Json<OtpSendRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing required fields")),
        )
            .into_response();
    };
    if request.recipient.trim().is_empty() || request.channel.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing required fields")),
        )
            .into_response();
    }
    let Some(channel) = Channel::parse(request.channel.trim()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid channel")),
        )
            .into_response();
    };

    match state.otp().send(request.recipient.trim(), channel).await {
        Ok(record) => {
            // Code echo is a mock-mode diagnostic; the external path never
            // reveals codes.
            let code = state.config().reveal_codes().then_some(record.code);
            (
                StatusCode::OK,
                Json(OtpSendResponse {
                    message: "OTP sent successfully".to_string(),
                    status: "sent".to_string(),
                    code,
                }),
            )
                .into_response()
        }
        Err(OtpSendError::InvalidRecipient(channel)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid recipient format for channel {channel}"
            ))),
        )
            .into_response(),
        Err(OtpSendError::ChannelUnconfigured) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("External OTP service not configured")),
        )
            .into_response(),
        Err(OtpSendError::DeliveryFailed(DeliveryError::Rejected { status, detail })) => {
            // Pass the upstream's status through where it is a valid code.
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            error!("OTP delivery rejected upstream ({status}): {detail}");
            (status, Json(ErrorResponse::new("Failed to send OTP"))).into_response()
        }
        Err(OtpSendError::DeliveryFailed(DeliveryError::Transport(detail))) => {
            error!("OTP delivery transport failure: {detail}");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Failed to send OTP")),
            )
                .into_response()
        }
        Err(OtpSendError::Store(err)) => {
            error!("Failed to store OTP: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

/// Verify a one-time code; on success, establish the authenticated session
/// and resolve the pending handshake (single-use) into a redirect target.
#[utoipa::path(
    post,
    path = "/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Verified; session established", body = OtpVerifyResponse),
        (status = 400, description = "Invalid, expired, or attempt-limited code", body = ErrorResponse)
    ),
    tag = "otp"
)]
pub async fn verify(
    headers: HeaderMap,
    state: Extension<Arc<GatewayState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing required fields")),
        )
            .into_response();
    };
    let recipient = request.recipient.trim();
    let code = request.code.trim();
    if recipient.is_empty() || code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing required fields")),
        )
            .into_response();
    }

    let outcome = match state.otp().verify(recipient, code).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to verify OTP: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response();
        }
    };

    match outcome {
        VerifyOutcome::Valid => resolved_response(&headers, &state, recipient).await,
        VerifyOutcome::TooManyAttempts => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Too many failed attempts. Please request a new OTP.",
            )),
        )
            .into_response(),
        VerifyOutcome::ExpiredOrNotFound => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "OTP expired or not found. Please request a new one.",
            )),
        )
            .into_response(),
        VerifyOutcome::WrongCode { remaining } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "Invalid OTP. {remaining} attempts remaining."
            ))),
        )
            .into_response(),
    }
}

/// Mint the session, consume the pending handshake behind the login cookie,
/// and point the client at the validated return URL, or at the gateway's own
/// landing page when this was not a delegated login. The fallback carries no
/// handshake state, so nothing leaks to unrelated apps.
async fn resolved_response(
    headers: &HeaderMap,
    state: &GatewayState,
    recipient: &str,
) -> axum::response::Response {
    let token = match state.identity().establish(recipient).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to establish session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response();
        }
    };

    let pending = match cookie_value(headers, LOGIN_COOKIE_NAME) {
        Some(session_id) => match state.broker().resolve(&session_id).await {
            Ok(pending) => pending,
            Err(err) => {
                // The user did authenticate; a broken handshake lookup only
                // downgrades the redirect to the default landing page.
                error!("Failed to resolve pending login: {err}");
                None
            }
        },
        None => None,
    };

    let (redirect_url, handshake_state) = match pending {
        Some(pending) => (pending.return_url, Some(pending.state)),
        None => (state.config().landing_path().to_string(), None),
    };

    let secure = state.config().cookie_secure();
    let mut response_headers = HeaderMap::new();
    match build_cookie(AUTH_COOKIE_NAME, &token, SESSION_TTL.as_secs(), secure) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
                .into_response();
        }
    }
    // The handshake correlator is spent either way.
    if let Ok(cookie) = clear_cookie(LOGIN_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }

    (
        StatusCode::OK,
        response_headers,
        Json(OtpVerifyResponse {
            message: "OTP verified successfully".to_string(),
            status: "verified".to_string(),
            user: VerifiedUser {
                email: recipient.to_string(),
            },
            redirect_url,
            state: handshake_state,
        }),
    )
        .into_response()
}
