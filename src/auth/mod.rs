//! Per-request identity resolution.
//!
//! [`AuthGate`] tries each configured trust model in priority order and stops
//! at the first one that yields a non-zero user id. A request without launch
//! data resolves to the development identity only when anonymous access was
//! enabled at startup; a request whose launch data fails every model is always
//! rejected.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::{NotesError, Result};
use crate::init_data::{
    default_max_age, PlatformKey, StandardValidator, ThirdPartyValidator, Validator,
};

/// Identity used for requests without launch data when anonymous access is on.
pub const DEV_USER_ID: i64 = 12345;

/// Startup configuration for the gate. Read-only once built.
#[derive(Clone)]
pub struct AuthConfig {
    /// Enables the standard (HMAC) trust model.
    pub bot_token: Option<String>,
    /// Enables the third-party (Ed25519) trust model.
    pub bot_id: Option<i64>,
    pub platform_key: PlatformKey,
    pub max_age: Duration,
    /// Lets requests without launch data through as `dev_user_id`.
    /// Never enable this in production.
    pub allow_anonymous: bool,
    pub dev_user_id: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_id: None,
            platform_key: PlatformKey::Production,
            max_age: default_max_age(),
            allow_anonymous: false,
            dev_user_id: DEV_USER_ID,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("bot_id", &self.bot_id)
            .field("platform_key", &self.platform_key)
            .field("max_age", &self.max_age)
            .field("allow_anonymous", &self.allow_anonymous)
            .field("dev_user_id", &self.dev_user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Launch data verified by the named trust model.
    Validated { validator: &'static str },
    /// No launch data; the development identity was used.
    Development,
}

/// The trusted user id for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: i64,
    pub source: IdentitySource,
}

impl ResolvedIdentity {
    pub fn is_development(&self) -> bool {
        self.source == IdentitySource::Development
    }
}

pub struct AuthGate {
    validators: Vec<Box<dyn Validator>>,
    dev_user_id: Option<i64>,
}

impl AuthGate {
    /// Build a gate from validators in priority order.
    ///
    /// `dev_user_id` enables the anonymous path; zero is rejected because it
    /// is never a valid identity.
    pub fn new(validators: Vec<Box<dyn Validator>>, dev_user_id: Option<i64>) -> Result<Self> {
        if dev_user_id == Some(0) {
            return Err(NotesError::Config(
                "development user id must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            validators,
            dev_user_id,
        })
    }

    /// Third-party validation is tried before standard validation.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let mut validators: Vec<Box<dyn Validator>> = Vec::new();

        if let Some(bot_id) = config.bot_id {
            let public_key = config.platform_key.verifying_key()?;
            validators.push(Box::new(ThirdPartyValidator::new(
                bot_id,
                public_key,
                config.max_age,
            )));
        }
        if let Some(token) = config.bot_token.as_deref().filter(|t| !t.is_empty()) {
            validators.push(Box::new(StandardValidator::new(token, config.max_age)));
        }

        let dev_user_id = config.allow_anonymous.then_some(config.dev_user_id);
        Self::new(validators, dev_user_id)
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub fn allows_anonymous(&self) -> bool {
        self.dev_user_id.is_some()
    }

    pub fn resolve(&self, raw: Option<&str>) -> Result<ResolvedIdentity> {
        self.resolve_at(raw, Utc::now())
    }

    pub fn resolve_at(&self, raw: Option<&str>, now: DateTime<Utc>) -> Result<ResolvedIdentity> {
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            return match self.dev_user_id {
                Some(user_id) => {
                    warn!(user_id, "No launch data supplied, using development identity");
                    Ok(ResolvedIdentity {
                        user_id,
                        source: IdentitySource::Development,
                    })
                }
                None => {
                    warn!("No launch data supplied and anonymous access is disabled");
                    Err(NotesError::Unauthorized)
                }
            };
        };

        for validator in &self.validators {
            let name = validator.name();
            debug!(validator = name, len = raw.len(), "Attempting launch data validation");

            match validator.validate(raw, now) {
                Ok(data) => match data.user_id() {
                    Some(user_id) if user_id != 0 => {
                        debug!(validator = name, user_id, "Launch data verified");
                        return Ok(ResolvedIdentity {
                            user_id,
                            source: IdentitySource::Validated { validator: name },
                        });
                    }
                    _ => warn!(validator = name, "Launch data verified but has no user id"),
                },
                Err(e) => warn!(validator = name, error = %e, "Launch data validation failed"),
            }
        }

        warn!(
            attempted = self.validators.len(),
            "No trust model accepted the launch data"
        );
        Err(NotesError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::init_data::testing::*;
    use crate::init_data::{LaunchData, ValidationError};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn test_gate(allow_anonymous: bool) -> AuthGate {
        let validators: Vec<Box<dyn Validator>> = vec![
            Box::new(ThirdPartyValidator::new(
                BOT_ID,
                signing_key().verifying_key(),
                Duration::hours(24),
            )),
            Box::new(StandardValidator::new(BOT_TOKEN, Duration::hours(24))),
        ];
        AuthGate::new(validators, allow_anonymous.then_some(DEV_USER_ID)).unwrap()
    }

    /// Counts calls and accepts everything as a fixed user.
    struct CountingValidator {
        calls: Arc<AtomicUsize>,
        user_id: i64,
    }

    impl Validator for CountingValidator {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn validate(&self, _raw: &str, _now: DateTime<Utc>) -> std::result::Result<LaunchData, ValidationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            LaunchData::parse(&format!("auth_date=1&user=%7B%22id%22%3A{}%7D", self.user_id))
        }
    }

    #[test]
    fn test_missing_header_uses_development_identity() {
        for raw in [None, Some("")] {
            let identity = test_gate(true).resolve_at(raw, now()).unwrap();
            assert_eq!(identity.user_id, DEV_USER_ID);
            assert!(identity.is_development());
        }
    }

    #[test]
    fn test_missing_header_ignores_configured_secrets() {
        let gate = AuthGate::new(Vec::new(), Some(777)).unwrap();
        assert_eq!(gate.resolve_at(None, now()).unwrap().user_id, 777);
        assert_eq!(test_gate(true).resolve_at(None, now()).unwrap().user_id, DEV_USER_ID);
    }

    #[test]
    fn test_missing_header_rejected_when_anonymous_disabled() {
        let result = test_gate(false).resolve_at(None, now());
        assert!(matches!(result, Err(NotesError::Unauthorized)));
    }

    #[test]
    fn test_third_party_payload_resolves() {
        let raw = sign_third_party(&signing_key(), BOT_ID, fields(1001, now().timestamp()));
        let identity = test_gate(false).resolve_at(Some(&raw), now()).unwrap();
        assert_eq!(identity.user_id, 1001);
        assert_eq!(
            identity.source,
            IdentitySource::Validated {
                validator: "third-party"
            }
        );
    }

    #[test]
    fn test_falls_back_to_standard_model() {
        let raw = sign_standard(BOT_TOKEN, fields(2002, now().timestamp()));
        let identity = test_gate(false).resolve_at(Some(&raw), now()).unwrap();
        assert_eq!(identity.user_id, 2002);
        assert_eq!(
            identity.source,
            IdentitySource::Validated {
                validator: "standard"
            }
        );
    }

    #[test]
    fn test_invalid_header_never_falls_back_to_development() {
        let raw = sign_standard("1:wrong", fields(3003, now().timestamp()));
        let result = test_gate(true).resolve_at(Some(&raw), now());
        assert!(matches!(result, Err(NotesError::Unauthorized)));

        let result = test_gate(true).resolve_at(Some("garbage"), now());
        assert!(matches!(result, Err(NotesError::Unauthorized)));
    }

    #[test]
    fn test_zero_user_id_is_rejected() {
        let raw = sign_standard(BOT_TOKEN, fields(0, now().timestamp()));
        let result = test_gate(false).resolve_at(Some(&raw), now());
        assert!(matches!(result, Err(NotesError::Unauthorized)));
    }

    #[test]
    fn test_missing_user_is_rejected() {
        let mut f = fields(1, now().timestamp());
        f.remove("user");
        let raw = sign_standard(BOT_TOKEN, f);
        let result = test_gate(false).resolve_at(Some(&raw), now());
        assert!(matches!(result, Err(NotesError::Unauthorized)));
    }

    #[test]
    fn test_header_without_any_trust_model_is_rejected() {
        let gate = AuthGate::new(Vec::new(), Some(DEV_USER_ID)).unwrap();
        let raw = sign_standard(BOT_TOKEN, fields(1, now().timestamp()));
        assert!(matches!(
            gate.resolve_at(Some(&raw), now()),
            Err(NotesError::Unauthorized)
        ));
    }

    #[test]
    fn test_stops_at_first_success() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let gate = AuthGate::new(
            vec![
                Box::new(CountingValidator {
                    calls: first.clone(),
                    user_id: 5,
                }),
                Box::new(CountingValidator {
                    calls: second.clone(),
                    user_id: 6,
                }),
            ],
            None,
        )
        .unwrap();

        let identity = gate.resolve_at(Some("anything"), now()).unwrap();
        assert_eq!(identity.user_id, 5);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_identity_moves_on_to_next_model() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let gate = AuthGate::new(
            vec![
                Box::new(CountingValidator {
                    calls: first.clone(),
                    user_id: 0,
                }),
                Box::new(CountingValidator {
                    calls: second.clone(),
                    user_id: 6,
                }),
            ],
            None,
        )
        .unwrap();

        assert_eq!(gate.resolve_at(Some("anything"), now()).unwrap().user_id, 6);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_orders_third_party_first() {
        let config = AuthConfig {
            bot_token: Some(BOT_TOKEN.to_string()),
            bot_id: Some(BOT_ID),
            ..AuthConfig::default()
        };
        let gate = AuthGate::from_config(&config).unwrap();
        assert_eq!(gate.validator_names(), vec!["third-party", "standard"]);
        assert!(!gate.allows_anonymous());
    }

    #[test]
    fn test_from_config_skips_empty_token() {
        let config = AuthConfig {
            bot_token: Some(String::new()),
            allow_anonymous: true,
            ..AuthConfig::default()
        };
        let gate = AuthGate::from_config(&config).unwrap();
        assert!(gate.validator_names().is_empty());
        assert!(gate.allows_anonymous());
    }

    #[test]
    fn test_zero_development_id_is_a_config_error() {
        let config = AuthConfig {
            allow_anonymous: true,
            dev_user_id: 0,
            ..AuthConfig::default()
        };
        assert!(matches!(
            AuthGate::from_config(&config),
            Err(NotesError::Config(_))
        ));
    }
}
