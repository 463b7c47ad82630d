use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{UtilError, gen_random_string};

/// Number of random bytes behind every user handle.
pub(crate) const USER_HANDLE_BYTES: usize = 32;

/// Opaque, stable WebAuthn user handle (base64url of random bytes).
///
/// Distinct from the username so the authenticator never learns the account name
/// from the handle alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserHandle(String);

impl UserHandle {
    pub fn new(handle: String) -> Self {
        Self(handle)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn generate() -> Result<Self, UtilError> {
        Ok(Self(gen_random_string(USER_HANDLE_BYTES)?))
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credential identifier (base64url of the authenticator's raw id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub user_handle: UserHandle,
    pub created_at: DateTime<Utc>,
}

/// A registered public-key credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub credential_id: CredentialId,
    pub owner: UserHandle,
    /// COSE-encoded public key as produced by the authenticator
    pub public_key: Vec<u8>,
    pub signature_counter: u32,
    pub friendly_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Credential {
    /// Projection handed to callers outside the core; carries no key material.
    pub fn info(&self) -> CredentialInfo {
        CredentialInfo {
            id: self.credential_id.clone(),
            name: self.friendly_name.clone(),
            created_at: self.created_at,
            last_used: self.last_used_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    pub id: CredentialId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Outcome of comparing a reported signature counter against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStatus {
    /// The counter moved forward.
    Advanced,
    /// Stored and reported counters are both zero: the authenticator keeps no counter.
    Unsupported,
    /// The counter went backward or repeated, a possible cloned authenticator.
    Regressed,
}

impl CounterStatus {
    pub fn evaluate(stored: u32, received: u32) -> Self {
        if stored == 0 && received == 0 {
            Self::Unsupported
        } else if received > stored {
            Self::Advanced
        } else {
            Self::Regressed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub previous: u32,
    pub current: u32,
    pub status: CounterStatus,
}
