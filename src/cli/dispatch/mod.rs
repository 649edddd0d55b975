use crate::cli::actions::{Action, OtpProvider};
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let otp_provider = match matches
        .get_one::<String>("otp-provider")
        .map(String::as_str)
    {
        Some("external") => OtpProvider::External,
        _ => OtpProvider::Mock,
    };

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        redis_url: matches
            .get_one::<String>("redis-url")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --redis-url"))?,
        apps_file: matches
            .get_one::<std::path::PathBuf>("apps-file")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --apps-file"))?,
        public_url: matches
            .get_one::<String>("public-url")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080".to_string()),
        ratelimit_url: matches.get_one::<String>("ratelimit-url").cloned(),
        ratelimit_requests: matches
            .get_one::<u32>("ratelimit-requests")
            .copied()
            .unwrap_or(10),
        ratelimit_window: matches
            .get_one::<u64>("ratelimit-window")
            .copied()
            .unwrap_or(60),
        otp_provider,
        otp_service_url: matches.get_one::<String>("otp-service-url").cloned(),
        otp_service_token: matches
            .get_one::<String>("otp-service-token")
            .map(|token| SecretString::from(token.clone())),
        otp_reveal_codes: matches.get_flag("otp-reveal-codes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "enirejo",
            "--redis-url",
            "redis://127.0.0.1:6379",
            "--apps-file",
            "apps.json",
            "--otp-provider",
            "external",
            "--otp-service-url",
            "https://otp.internal/send",
            "--otp-reveal-codes",
        ]);

        let action = handler(&matches).expect("action");
        let Action::Server {
            port,
            redis_url,
            otp_provider,
            otp_service_url,
            otp_reveal_codes,
            ratelimit_url,
            ..
        } = action;
        assert_eq!(port, 8080);
        assert_eq!(redis_url, "redis://127.0.0.1:6379");
        assert_eq!(otp_provider, OtpProvider::External);
        assert_eq!(otp_service_url.as_deref(), Some("https://otp.internal/send"));
        assert!(otp_reveal_codes);
        assert!(ratelimit_url.is_none());
    }
}
