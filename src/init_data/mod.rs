//! Telegram Mini App launch data ("init data").
//!
//! The client passes the raw query string it was launched with. This module
//! parses it into [`LaunchData`] and verifies it under one of two trust models:
//!
//! - [`StandardValidator`]: HMAC-SHA256 keyed by the bot token (`hash` field).
//! - [`ThirdPartyValidator`]: Ed25519 signature by the platform over the bot id
//!   and the payload (`signature` field), no shared secret needed.
//!
//! Validation is pure: the caller supplies the current time, and nothing is
//! cached between calls.

mod standard;
mod third_party;

pub use standard::{validate_standard, StandardValidator};
pub use third_party::{
    decode_public_key, validate_third_party, PlatformKey, ThirdPartyValidator,
    PRODUCTION_PUBLIC_KEY, TEST_PUBLIC_KEY,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HASH_KEY: &str = "hash";
pub const SIGNATURE_KEY: &str = "signature";
pub const AUTH_DATE_KEY: &str = "auth_date";
pub const USER_KEY: &str = "user";

/// How old launch data may be before it is rejected.
pub fn default_max_age() -> Duration {
    Duration::hours(24)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed launch data: {0}")]
    MalformedPayload(String),

    #[error("launch data signature mismatch")]
    SignatureMismatch,

    #[error("launch data expired: issued {age_secs}s ago, max age is {max_age_secs}s")]
    Expired { age_secs: i64, max_age_secs: i64 },
}

impl ValidationError {
    fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}

/// One trust model. The auth gate holds these in priority order.
pub trait Validator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn validate(&self, raw: &str, now: DateTime<Utc>) -> Result<LaunchData, ValidationError>;
}

/// The `user` object embedded in launch data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub allows_write_to_pm: bool,
}

/// Parsed launch data. Only trustworthy once a [`Validator`] returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchData {
    fields: BTreeMap<String, String>,
    issued_at: DateTime<Utc>,
    user: Option<LaunchUser>,
}

impl LaunchData {
    /// Parse a raw query string without checking any signature.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut fields = BTreeMap::new();

        for segment in raw.split('&').filter(|s| !s.is_empty()) {
            if !segment.contains('=') {
                return Err(ValidationError::malformed(format!(
                    "pair without '=': {segment}"
                )));
            }
            let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
                return Err(ValidationError::malformed("undecodable pair"));
            };
            if key.is_empty() {
                return Err(ValidationError::malformed("empty key"));
            }
            let key = key.into_owned();
            if fields.contains_key(&key) {
                return Err(ValidationError::malformed(format!("duplicate key: {key}")));
            }
            fields.insert(key, value.into_owned());
        }

        if fields.is_empty() {
            return Err(ValidationError::malformed("no key/value pairs"));
        }

        let auth_date = fields
            .get(AUTH_DATE_KEY)
            .ok_or_else(|| ValidationError::malformed("missing auth_date"))?;
        let secs: i64 = auth_date
            .parse()
            .map_err(|_| ValidationError::malformed(format!("invalid auth_date: {auth_date}")))?;
        let issued_at = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ValidationError::malformed(format!("auth_date out of range: {secs}")))?;

        let user = fields
            .get(USER_KEY)
            .map(|raw_user| serde_json::from_str::<LaunchUser>(raw_user))
            .transpose()
            .map_err(|e| ValidationError::malformed(format!("invalid user object: {e}")))?;

        Ok(Self {
            fields,
            issued_at,
            user,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn user(&self) -> Option<&LaunchUser> {
        self.user.as_ref()
    }

    /// The claimed user id, if a user object is present.
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn hash(&self) -> Option<&str> {
        self.get(HASH_KEY)
    }

    pub fn signature(&self) -> Option<&str> {
        self.get(SIGNATURE_KEY)
    }

    pub fn query_id(&self) -> Option<&str> {
        self.get("query_id")
    }

    pub fn start_param(&self) -> Option<&str> {
        self.get("start_param")
    }

    pub fn chat_type(&self) -> Option<&str> {
        self.get("chat_type")
    }

    /// Canonical serialization: sorted `key=value` lines, skipping `excluded`.
    pub fn check_string(&self, excluded: &[&str]) -> String {
        data_check_string(&self.fields, excluded)
    }

    /// A zero or negative `max_age` disables the check.
    pub fn check_expiry(&self, max_age: Duration, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if max_age <= Duration::zero() {
            return Ok(());
        }
        let age = now - self.issued_at;
        if age > max_age {
            return Err(ValidationError::Expired {
                age_secs: age.num_seconds(),
                max_age_secs: max_age.num_seconds(),
            });
        }
        Ok(())
    }
}

pub(crate) fn data_check_string(fields: &BTreeMap<String, String>, excluded: &[&str]) -> String {
    fields
        .iter()
        .filter(|(key, _)| !excluded.contains(&key.as_str()))
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
