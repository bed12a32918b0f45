use std::net::IpAddr;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};

use crate::auth::DEV_USER_ID;
use crate::bot::DEFAULT_API_URL;

#[derive(Parser, Debug)]
#[command(name = "tma-notes")]
#[command(version, about = "Notes API for Telegram Mini Apps, plus an echo bot")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the notes HTTP API
    Serve(ServeArgs),

    /// Run the echo bot (webhook mode when a webhook URL is set, polling otherwise)
    Bot(BotArgs),

    /// Verify a launch data string and print the user it carries
    Verify(VerifyArgs),
}

/// Secrets and freshness settings shared by `serve` and `verify`.
#[derive(Args, Debug)]
pub struct TrustArgs {
    /// Bot token; enables standard validation
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Numeric bot id; enables third-party validation
    #[arg(long, env = "TELEGRAM_BOT_ID")]
    pub bot_id: Option<i64>,

    /// Check third-party signatures against the test environment key
    #[arg(long, env = "TELEGRAM_TEST_ENV", value_parser = BoolishValueParser::new())]
    pub test_environment: bool,

    /// Maximum launch data age in seconds (0 disables the check)
    #[arg(long, default_value_t = 86_400, env = "INIT_DATA_MAX_AGE_SECS")]
    pub max_age_secs: u64,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 3000, env = "PORT")]
    pub port: u16,

    #[command(flatten)]
    pub trust: TrustArgs,

    /// Serve requests without launch data as the development user.
    /// Do not enable in production.
    #[arg(long, env = "ALLOW_ANONYMOUS", value_parser = BoolishValueParser::new())]
    pub allow_anonymous: bool,

    /// User id for requests without launch data
    #[arg(long, default_value_t = DEV_USER_ID, env = "DEV_USER_ID")]
    pub dev_user_id: i64,

    /// Allowed CORS origin (repeatable or comma-separated; none allows any)
    #[arg(long = "cors-origin", env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BotArgs {
    /// Bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Public base URL; `/webhook` is appended when registering
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Secret Telegram must send with every webhook delivery
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Port for the webhook and health endpoints
    #[arg(long, short = 'p', default_value_t = 3001, env = "PORT")]
    pub port: u16,

    /// Bot API base URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "TELEGRAM_API_URL")]
    pub api_url: String,

    /// Long polling timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub poll_timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Raw launch data (the X-Init-Data header value)
    pub init_data: String,

    #[command(flatten)]
    pub trust: TrustArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
