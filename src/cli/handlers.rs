use std::time::Duration as StdDuration;

use chrono::Duration;

use super::commands::{BotArgs, ServeArgs, TrustArgs, VerifyArgs};
use crate::api::{self, ServerConfig};
use crate::auth::{AuthConfig, AuthGate, IdentitySource};
use crate::bot::{self, BotConfig};
use crate::error::{NotesError, Result};
use crate::init_data::{LaunchData, PlatformKey};
use crate::runtime;

fn auth_config(trust: TrustArgs, allow_anonymous: bool, dev_user_id: i64) -> Result<AuthConfig> {
    let max_age = i64::try_from(trust.max_age_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            NotesError::Config(format!("max age out of range: {}", trust.max_age_secs))
        })?;

    Ok(AuthConfig {
        bot_token: trust.bot_token.filter(|t| !t.is_empty()),
        bot_id: trust.bot_id,
        platform_key: if trust.test_environment {
            PlatformKey::Test
        } else {
            PlatformKey::Production
        },
        max_age,
        allow_anonymous,
        dev_user_id,
    })
}

pub fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        auth: auth_config(args.trust, args.allow_anonymous, args.dev_user_id)?,
        cors_origins: args
            .cors_origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
    };
    runtime::block_on(api::run(config))?
}

pub fn handle_bot(args: BotArgs) -> Result<()> {
    let config = BotConfig {
        bot_token: args.bot_token,
        webhook_url: args.webhook_url,
        webhook_secret: args.webhook_secret.filter(|s| !s.is_empty()),
        port: args.port,
        api_url: args.api_url,
        poll_timeout: StdDuration::from_secs(args.poll_timeout_secs),
    };
    runtime::block_on(bot::run(config))?
}

pub fn handle_verify(args: VerifyArgs) -> Result<()> {
    let config = auth_config(args.trust, false, 0)?;
    if config.bot_token.is_none() && config.bot_id.is_none() {
        return Err(NotesError::Config(
            "pass --bot-token and/or --bot-id to verify launch data".to_string(),
        ));
    }

    let gate = AuthGate::from_config(&config)?;
    let identity = gate.resolve(Some(args.init_data.as_str()))?;
    let validator = match identity.source {
        IdentitySource::Validated { validator } => validator,
        IdentitySource::Development => "development",
    };
    // Already verified by the gate, so this parse cannot fail.
    let data = LaunchData::parse(&args.init_data).map_err(|_| NotesError::Unauthorized)?;

    if args.json {
        let output = serde_json::json!({
            "valid": true,
            "validator": validator,
            "user_id": identity.user_id,
            "user": data.user(),
            "auth_date": data.issued_at().to_rfc3339(),
            "start_param": data.start_param(),
            "chat_type": data.chat_type(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Verified by {validator} validation");
        println!("  user id:   {}", identity.user_id);
        if let Some(user) = data.user() {
            let name = match &user.last_name {
                Some(last) => format!("{} {}", user.first_name, last),
                None => user.first_name.clone(),
            };
            println!("  name:      {name}");
            if let Some(username) = &user.username {
                println!("  username:  @{username}");
            }
        }
        if let Some(chat_type) = data.chat_type() {
            println!("  chat type: {chat_type}");
        }
        println!("  issued at: {}", data.issued_at().to_rfc3339());
    }

    Ok(())
}
