//! Request/response types for the auth and OTP endpoints.
//!
//! Field names follow the wire contract the client apps already speak
//! (camelCase on responses, snake_case query parameters).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug)]
pub struct InitiateQuery {
    pub app_id: Option<String>,
    pub return_url: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PendingSessionResponse {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "returnUrl")]
    pub return_url: String,
    pub state: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpSendRequest {
    pub recipient: String,
    pub channel: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpSendResponse {
    pub message: String,
    pub status: String,
    /// Mock-mode diagnostics only; absent in external mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpVerifyRequest {
    pub recipient: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifiedUser {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpVerifyResponse {
    pub message: String,
    pub status: String,
    pub user: VerifiedUser,
    /// Where the client should navigate next: the validated return URL of the
    /// consumed handshake, or the gateway's own landing page.
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    /// CSRF state of the consumed handshake; absent when this was not a
    /// delegated login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_session_uses_camel_case() {
        let response = PendingSessionResponse {
            app_id: "app1".to_string(),
            return_url: "https://app1.company.com/auth/callback".to_string(),
            state: "abc".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["appId"], "app1");
        assert_eq!(value["returnUrl"], "https://app1.company.com/auth/callback");
        assert_eq!(value["state"], "abc");
    }

    #[test]
    fn otp_send_response_omits_absent_code() {
        let response = OtpSendResponse {
            message: "OTP sent successfully".to_string(),
            status: "sent".to_string(),
            code: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("code").is_none());
    }

    #[test]
    fn verify_response_shape() {
        let response = OtpVerifyResponse {
            message: "OTP verified successfully".to_string(),
            status: "verified".to_string(),
            user: VerifiedUser {
                email: "a@example.com".to_string(),
            },
            redirect_url: "/profile".to_string(),
            state: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["redirectUrl"], "/profile");
        assert!(value.get("state").is_none());
    }
}
