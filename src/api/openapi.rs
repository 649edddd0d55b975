use utoipa::OpenApi;
use utoipa::openapi::{Contact, InfoBuilder, License};

use super::handlers::{auth, health, otp, types};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::initiate,
        auth::check_login_session,
        auth::session,
        auth::logout,
        otp::send,
        otp::verify,
    ),
    components(schemas(
        health::Health,
        types::ErrorResponse,
        types::PendingSessionResponse,
        types::OtpSendRequest,
        types::OtpSendResponse,
        types::OtpVerifyRequest,
        types::OtpVerifyResponse,
        types::VerifiedUser,
        types::SessionUser,
        types::SessionResponse,
        types::LogoutResponse,
    )),
    tags(
        (name = "auth", description = "Cross-application login handshake and sessions"),
        (name = "otp", description = "One-time passcode issuance and verification"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

/// The served document; info comes from Cargo.toml metadata instead of the
/// derive defaults.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info = cargo_info();
    spec
}

fn cargo_info() -> utoipa::openapi::Info {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(License::new);
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next()?.trim();
    let (name, email) = match primary.split_once('<') {
        Some((name, email)) => (name.trim(), Some(email.trim_end_matches('>').trim())),
        None => (primary, None),
    };
    if name.is_empty() && email.is_none() {
        return None;
    }
    let mut contact = Contact::new();
    contact.name = (!name.is_empty()).then(|| name.to_string());
    contact.email = email.filter(|email| !email.is_empty()).map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact.expect("contact");
        assert_eq!(contact.name.as_deref(), Some("Team Enirejo"));
        assert_eq!(contact.email.as_deref(), Some("team@enirejo.dev"));

        let license = spec.info.license.expect("license");
        assert_eq!(license.name, "BSD-3-Clause");
    }

    #[test]
    fn openapi_paths_registered() {
        let spec = openapi();
        for path in [
            "/health",
            "/auth/initiate",
            "/auth/check-login-session",
            "/auth/session",
            "/auth/logout",
            "/otp/send",
            "/otp/verify",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
