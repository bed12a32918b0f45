use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{
    ApiResponse, DeleteWebhook, GetUpdates, SendMessage, SetWebhook, Update, User,
};
use crate::error::{NotesError, Result};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra time on top of the long-poll timeout before the HTTP call gives up.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Minimal Bot API client.
#[derive(Clone)]
pub struct BotClient {
    http: reqwest::Client,
    // Contains the token; never logged.
    base_url: String,
}

impl fmt::Debug for BotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotClient").finish_non_exhaustive()
    }
}

impl BotClient {
    pub fn new(api_url: &str, bot_token: &str, poll_timeout: Duration) -> Result<Self> {
        if bot_token.is_empty() {
            return Err(NotesError::Config("bot token is required".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()
            .map_err(|e| NotesError::Http(e.without_url()))?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // Strip the URL from transport errors so the token cannot leak.
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(params)
            .send()
            .await
            .map_err(|e| NotesError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| NotesError::Http(e.without_url()))?;
        response.into_result()
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message".to_string()],
        };
        self.call("getUpdates", &params).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<()> {
        let _: serde_json::Value = self.call("sendMessage", message).await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<bool> {
        let params = SetWebhook {
            url: url.to_string(),
            secret_token: secret_token.map(str::to_string),
            allowed_updates: vec!["message".to_string()],
        };
        self.call("setWebhook", &params).await
    }

    pub async fn delete_webhook(&self) -> Result<bool> {
        let params = DeleteWebhook {
            drop_pending_updates: false,
        };
        self.call("deleteWebhook", &params).await
    }
}
