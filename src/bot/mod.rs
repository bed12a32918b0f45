//! Echo bot: replies to every text message with the same text.
//!
//! Updates arrive either by webhook (when a public URL is configured) or by
//! long polling. Both modes expose `GET /health` and stop on Ctrl-C.

mod client;
pub mod types;

pub use client::{BotClient, DEFAULT_API_URL};

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::Result;
use crate::runtime::shutdown_token;
use types::{SendMessage, Update};

/// Header Telegram uses to echo back the webhook secret.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

const RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Webhook { url: String },
    Polling,
}

#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub port: u16,
    pub api_url: String,
    pub poll_timeout: Duration,
}

impl BotConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            webhook_url: None,
            webhook_secret: None,
            port: 3001,
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout: Duration::from_secs(30),
        }
    }

    /// Webhook mode when a non-empty URL is configured, polling otherwise.
    pub fn transport(&self) -> Transport {
        match self.webhook_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Transport::Webhook {
                url: format!("{}/webhook", url.trim_end_matches('/')),
            },
            _ => Transport::Polling,
        }
    }
}

/// The reply for an update, if it carries a text message.
pub fn echo_reply(update: &Update) -> Option<SendMessage> {
    let message = update.message.as_ref()?;
    let text = message.text.as_ref().filter(|t| !t.is_empty())?;
    Some(SendMessage {
        chat_id: message.chat.id,
        text: text.clone(),
    })
}

async fn handle_update(client: &BotClient, update: &Update) {
    let Some(reply) = echo_reply(update) else {
        return;
    };
    let from = update
        .message
        .as_ref()
        .and_then(|m| m.from.as_ref())
        .map(|u| u.id);
    info!(from = ?from, chat_id = reply.chat_id, "Echoing message");

    if let Err(e) = client.send_message(&reply).await {
        warn!(chat_id = reply.chat_id, error = %e, "Failed to send message");
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "tma-echo-bot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Clone)]
struct WebhookState {
    client: BotClient,
    secret: Option<String>,
}

// The body stays raw until the secret is checked.
async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = state.secret.as_deref() {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if !bool::from(provided.ct_eq(expected.as_bytes())) {
            warn!("Webhook delivery with wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed webhook update");
            return StatusCode::BAD_REQUEST;
        }
    };

    // Acknowledge right away; Telegram retries slow deliveries.
    if echo_reply(&update).is_some() {
        let client = state.client.clone();
        tokio::spawn(async move { handle_update(&client, &update).await });
    }
    StatusCode::OK
}

pub fn health_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

pub fn webhook_router(client: BotClient, secret: Option<String>) -> Router {
    Router::new()
        .route("/webhook", post(receive_update))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(WebhookState { client, secret })
}

async fn serve(addr: SocketAddr, app: Router, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Bot HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

async fn poll(client: BotClient, poll_timeout: Duration, shutdown: CancellationToken) -> Result<()> {
    match client.delete_webhook().await {
        Ok(true) => info!("Deleted existing webhook"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Failed to delete existing webhook"),
    }

    let mut offset = 0;
    loop {
        let updates = tokio::select! {
            _ = shutdown.cancelled() => break,
            updates = client.get_updates(offset, poll_timeout) => updates,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    handle_update(&client, &update).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Polling for updates failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    Ok(())
}

/// Run the bot until Ctrl-C.
pub async fn run(config: BotConfig) -> Result<()> {
    let client = BotClient::new(&config.api_url, &config.bot_token, config.poll_timeout)?;
    let me = client.get_me().await?;
    info!(bot_id = me.id, username = ?me.username, "Bot authorized");

    let shutdown = shutdown_token();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));

    match config.transport() {
        Transport::Webhook { url } => {
            info!(url = %url, "Starting in webhook mode");
            client
                .set_webhook(&url, config.webhook_secret.as_deref())
                .await?;
            info!("Webhook registered");
            serve(addr, webhook_router(client, config.webhook_secret), shutdown).await?;
        }
        Transport::Polling => {
            info!("Starting in polling mode (no webhook URL configured)");
            tokio::try_join!(
                serve(addr, health_router(), shutdown.clone()),
                poll(client, config.poll_timeout, shutdown.clone()),
            )?;
        }
    }

    info!("Bot stopped");
    Ok(())
}
