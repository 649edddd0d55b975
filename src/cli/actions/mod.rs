pub mod server;

use secrecy::SecretString;
use std::path::PathBuf;

/// Where `/otp/send` dispatches codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpProvider {
    /// Log the code instead of delivering it (local development).
    Mock,
    /// POST the code to an external delivery service.
    External,
}

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        redis_url: String,
        apps_file: PathBuf,
        public_url: String,
        ratelimit_url: Option<String>,
        ratelimit_requests: u32,
        ratelimit_window: u64,
        otp_provider: OtpProvider,
        otp_service_url: Option<String>,
        otp_service_token: Option<SecretString>,
        otp_reveal_codes: bool,
    },
}
