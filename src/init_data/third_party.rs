use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::{LaunchData, ValidationError, Validator, HASH_KEY, SIGNATURE_KEY};
use crate::error::{NotesError, Result};

/// Platform key for launches in the production environment.
pub const PRODUCTION_PUBLIC_KEY: &str =
    "e7bf03a2fa4602af4580703d88dda5bb59f32ed8b02a56c187fe7d34caed242d";

/// Platform key for launches in the test environment.
pub const TEST_PUBLIC_KEY: &str =
    "40055058a4ee38156a06562e52eece92a771bcd8346a8c4615cb7376eddf72ec";

/// Which published platform key signs third-party launch data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformKey {
    #[default]
    Production,
    Test,
}

impl PlatformKey {
    pub fn hex(self) -> &'static str {
        match self {
            PlatformKey::Production => PRODUCTION_PUBLIC_KEY,
            PlatformKey::Test => TEST_PUBLIC_KEY,
        }
    }

    pub fn verifying_key(self) -> Result<VerifyingKey> {
        decode_public_key(self.hex())
    }
}

/// Decode a hex-encoded Ed25519 public key.
pub fn decode_public_key(hex_key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| NotesError::Config(format!("invalid public key hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| NotesError::Config("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| NotesError::Config(format!("invalid public key: {e}")))
}

/// Verifies the platform's Ed25519 `signature` field for a bot id.
#[derive(Debug, Clone)]
pub struct ThirdPartyValidator {
    bot_id: i64,
    public_key: VerifyingKey,
    max_age: Duration,
}

impl ThirdPartyValidator {
    pub fn new(bot_id: i64, public_key: VerifyingKey, max_age: Duration) -> Self {
        Self {
            bot_id,
            public_key,
            max_age,
        }
    }

    pub fn bot_id(&self) -> i64 {
        self.bot_id
    }
}

impl Validator for ThirdPartyValidator {
    fn name(&self) -> &'static str {
        "third-party"
    }

    fn validate(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<LaunchData, ValidationError> {
        validate_third_party(raw, self.bot_id, &self.public_key, self.max_age, now)
    }
}

/// Validate launch data signed by the platform for `bot_id`.
///
/// The signed message is `"{bot_id}:WebAppData\n"` followed by the check
/// string over every field except `hash` and `signature`.
pub fn validate_third_party(
    raw: &str,
    bot_id: i64,
    public_key: &VerifyingKey,
    max_age: Duration,
    now: DateTime<Utc>,
) -> std::result::Result<LaunchData, ValidationError> {
    let data = LaunchData::parse(raw)?;
    let encoded = data
        .signature()
        .ok_or_else(|| ValidationError::MalformedPayload("missing signature".to_string()))?;

    data.check_expiry(max_age, now)?;

    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| ValidationError::SignatureMismatch)?;
    let signature =
        Signature::from_slice(&bytes).map_err(|_| ValidationError::SignatureMismatch)?;

    let message = format!(
        "{bot_id}:WebAppData\n{}",
        data.check_string(&[HASH_KEY, SIGNATURE_KEY])
    );
    public_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| ValidationError::SignatureMismatch)?;

    Ok(data)
}
