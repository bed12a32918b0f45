use std::fmt;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{LaunchData, ValidationError, Validator, HASH_KEY};

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation key for deriving the signing secret from the bot token.
const WEB_APP_DATA: &[u8] = b"WebAppData";

/// Verifies the `hash` field against a bot token.
pub struct StandardValidator {
    bot_token: String,
    max_age: Duration,
}

impl StandardValidator {
    pub fn new(bot_token: impl Into<String>, max_age: Duration) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age,
        }
    }
}

impl fmt::Debug for StandardValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardValidator")
            .field("bot_token", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl Validator for StandardValidator {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn validate(&self, raw: &str, now: DateTime<Utc>) -> Result<LaunchData, ValidationError> {
        validate_standard(raw, &self.bot_token, self.max_age, now)
    }
}

/// Validate launch data signed with the bot token.
///
/// The expected hash is `HMAC_SHA256(HMAC_SHA256("WebAppData", token), check_string)`
/// where the check string covers every field except `hash`.
pub fn validate_standard(
    raw: &str,
    bot_token: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<LaunchData, ValidationError> {
    let data = LaunchData::parse(raw)?;
    let hash = data
        .hash()
        .ok_or_else(|| ValidationError::MalformedPayload("missing hash".to_string()))?;

    data.check_expiry(max_age, now)?;

    // Exact match against the lowercase hex encoding.
    let computed = hex::encode(sign(bot_token, &data.check_string(&[HASH_KEY]))?);
    if hash.len() != computed.len() || !bool::from(hash.as_bytes().ct_eq(computed.as_bytes())) {
        return Err(ValidationError::SignatureMismatch);
    }

    Ok(data)
}

pub(crate) fn sign(bot_token: &str, check_string: &str) -> Result<Vec<u8>, ValidationError> {
    let secret = hmac_sha256(WEB_APP_DATA, bot_token.as_bytes())?;
    hmac_sha256(&secret, check_string.as_bytes())
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, ValidationError> {
    // HMAC accepts keys of any length, so this only fails on a broken backend.
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| ValidationError::SignatureMismatch)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
