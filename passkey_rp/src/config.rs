//! Relying-party configuration loaded from the environment.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
}

/// How strongly the authenticator must verify the user (PIN, biometrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

impl UserVerification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// Whether the authenticator should create a discoverable credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKey {
    Required,
    Preferred,
    Discouraged,
}

impl ResidentKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// What the credential store does with a signature counter that did not increase.
///
/// `Record` keeps the reported value and flags the regression; `Reject` refuses
/// the update so the authentication fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterPolicy {
    #[default]
    Record,
    Reject,
}

#[derive(Debug, Clone)]
pub struct RpConfig {
    pub rp_id: String,
    pub rp_name: String,
    /// Primary origin first, followed by any additional allowed origins.
    pub origins: Vec<String>,
    /// Timeout handed to the browser, in seconds.
    pub timeout: u32,
    /// Maximum age of an issued challenge.
    pub challenge_timeout: Duration,
    pub user_verification: UserVerification,
    pub resident_key: ResidentKey,
    pub counter_policy: CounterPolicy,
}

const DEFAULT_TIMEOUT_SECS: u32 = 60;
const DEFAULT_CHALLENGE_TIMEOUT_SECS: u64 = 300;
const MAX_CHALLENGE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

impl RpConfig {
    /// Builds a configuration for `origin` with every other setting at its default.
    pub fn new(origin: &str) -> Result<Self, ConfigError> {
        let (origin, host) = normalize_origin(origin)?;
        Ok(Self {
            rp_id: host,
            rp_name: origin.clone(),
            origins: vec![origin],
            timeout: DEFAULT_TIMEOUT_SECS,
            challenge_timeout: Duration::from_secs(DEFAULT_CHALLENGE_TIMEOUT_SECS),
            user_verification: UserVerification::Preferred,
            resident_key: ResidentKey::Required,
            counter_policy: CounterPolicy::Record,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the settings through `lookup`, so callers can supply any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = lookup("ORIGIN").ok_or(ConfigError::Missing("ORIGIN"))?;
        let mut config = Self::new(&origin)?;

        if let Some(rp_id) = lookup("PASSKEY_RP_ID").filter(|v| !v.trim().is_empty()) {
            config.rp_id = rp_id.trim().to_string();
        }
        if let Some(name) = lookup("PASSKEY_RP_NAME").filter(|v| !v.trim().is_empty()) {
            config.rp_name = name;
        }
        if let Some(extra) = lookup("PASSKEY_ADDITIONAL_ORIGINS") {
            for candidate in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (origin, _) = normalize_origin(candidate)?;
                if !config.origins.contains(&origin) {
                    config.origins.push(origin);
                }
            }
        }
        if let Some(v) = lookup("PASSKEY_TIMEOUT") {
            config.timeout = v.parse::<u32>().unwrap_or_else(|_| {
                tracing::warn!("Invalid PASSKEY_TIMEOUT: {}. Using default {}", v, DEFAULT_TIMEOUT_SECS);
                DEFAULT_TIMEOUT_SECS
            });
        }
        if let Some(v) = lookup("PASSKEY_CHALLENGE_TIMEOUT") {
            let secs = v.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(
                    "Invalid PASSKEY_CHALLENGE_TIMEOUT: {}. Using default {}",
                    v,
                    DEFAULT_CHALLENGE_TIMEOUT_SECS
                );
                DEFAULT_CHALLENGE_TIMEOUT_SECS
            });
            if secs > MAX_CHALLENGE_TIMEOUT_SECS {
                tracing::warn!(
                    "PASSKEY_CHALLENGE_TIMEOUT {} is too large. Using {}",
                    secs,
                    MAX_CHALLENGE_TIMEOUT_SECS
                );
            }
            config.challenge_timeout = Duration::from_secs(secs.min(MAX_CHALLENGE_TIMEOUT_SECS));
        }
        if let Some(v) = lookup("PASSKEY_USER_VERIFICATION") {
            config.user_verification = match v.to_lowercase().as_str() {
                "required" => UserVerification::Required,
                "preferred" => UserVerification::Preferred,
                "discouraged" => UserVerification::Discouraged,
                invalid => {
                    tracing::warn!("Invalid user verification: {}. Using default 'preferred'", invalid);
                    UserVerification::Preferred
                }
            };
        }
        if let Some(v) = lookup("PASSKEY_RESIDENT_KEY") {
            config.resident_key = match v.to_lowercase().as_str() {
                "required" => ResidentKey::Required,
                "preferred" => ResidentKey::Preferred,
                "discouraged" => ResidentKey::Discouraged,
                invalid => {
                    tracing::warn!("Invalid resident key: {}. Using default 'required'", invalid);
                    ResidentKey::Required
                }
            };
        }
        if let Some(v) = lookup("PASSKEY_COUNTER_POLICY") {
            config.counter_policy = match v.to_lowercase().as_str() {
                "record" => CounterPolicy::Record,
                "reject" => CounterPolicy::Reject,
                invalid => {
                    tracing::warn!("Invalid counter policy: {}. Using default 'record'", invalid);
                    CounterPolicy::Record
                }
            };
        }

        tracing::debug!("Relying party configuration: {:?}", config);
        Ok(config)
    }

    /// `None` only for a hand-built config without origins.
    pub fn primary_origin(&self) -> Option<&str> {
        self.origins.first().map(String::as_str)
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }
}

/// Returns the serialized origin (`scheme://host[:port]`) and its host.
fn normalize_origin(origin: &str) -> Result<(String, String), ConfigError> {
    let url = Url::parse(origin.trim()).map_err(|e| ConfigError::InvalidOrigin {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidOrigin {
            origin: origin.to_string(),
            reason: "origin has no host".to_string(),
        })?
        .to_string();
    Ok((url.origin().ascii_serialization(), host))
}
