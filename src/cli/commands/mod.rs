use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::{
        PossibleValuesParser, ValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("enirejo")
        .about("Single Sign-On login gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("ENIREJO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("redis-url")
                .short('r')
                .long("redis-url")
                .help("Redis connection URL for the state store")
                .env("ENIREJO_REDIS_URL")
                .required(true),
        )
        .arg(
            Arg::new("apps-file")
                .short('a')
                .long("apps-file")
                .help("Path to the JSON app registry")
                .env("ENIREJO_APPS_FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("Public base URL of the gateway, example: https://sso.company.com")
                .default_value("http://localhost:8080")
                .env("ENIREJO_PUBLIC_URL"),
        )
        .arg(
            Arg::new("ratelimit-url")
                .long("ratelimit-url")
                .help("Redis connection URL for rate limiting (disabled when unset)")
                .env("ENIREJO_RATELIMIT_URL"),
        )
        .arg(
            Arg::new("ratelimit-requests")
                .long("ratelimit-requests")
                .help("Requests allowed per client per window")
                .default_value("10")
                .env("ENIREJO_RATELIMIT_REQUESTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("ratelimit-window")
                .long("ratelimit-window")
                .help("Rate limit window in seconds")
                .default_value("60")
                .env("ENIREJO_RATELIMIT_WINDOW")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("otp-provider")
                .long("otp-provider")
                .help("OTP delivery provider")
                .default_value("mock")
                .env("ENIREJO_OTP_PROVIDER")
                .value_parser(PossibleValuesParser::new(["mock", "external"])),
        )
        .arg(
            Arg::new("otp-service-url")
                .long("otp-service-url")
                .help("External OTP delivery service URL")
                .env("ENIREJO_OTP_SERVICE_URL"),
        )
        .arg(
            Arg::new("otp-service-token")
                .long("otp-service-token")
                .help("Bearer token for the external OTP delivery service")
                .env("ENIREJO_OTP_SERVICE_TOKEN"),
        )
        .arg(
            Arg::new("otp-reveal-codes")
                .long("otp-reveal-codes")
                .help("Echo generated codes in /otp/send responses (mock provider only)")
                .env("ENIREJO_OTP_REVEAL_CODES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("ENIREJO_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
