use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{CounterUpdate, CredentialId, CredentialInfo, UserHandle};

/// Mode of registration operation to explicitly indicate user intent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Adding a passkey to the signed-in user
    AddToUser,
    /// Creating a new user with a passkey
    #[default]
    CreateUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStartRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub mode: RegistrationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub username: String,
    pub credential: CredentialInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOutcome {
    pub username: String,
    pub user_handle: UserHandle,
    pub credential_id: CredentialId,
    pub counter: CounterUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub passkey_count: usize,
}
