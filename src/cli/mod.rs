mod commands;
mod handlers;

pub use commands::{BotArgs, Cli, Commands, ServeArgs, TrustArgs, VerifyArgs};
pub use handlers::{handle_bot, handle_serve, handle_verify};
