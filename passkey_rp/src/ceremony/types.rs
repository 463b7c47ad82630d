use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => f.write_str("registration"),
            Self::Authentication => f.write_str("authentication"),
        }
    }
}

/// Gateway state kept verbatim between the start and finish of a ceremony.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueState(String);

impl OpaqueState {
    pub fn new(state: String) -> Self {
        Self(state)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The state embeds the challenge, so keep it out of logs.
impl fmt::Debug for OpaqueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueState({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone)]
pub struct PendingCeremony {
    pub kind: CeremonyKind,
    /// Absent for discoverable authentication
    pub subject_username: Option<String>,
    /// Registration that may only attach the user's first credential
    pub new_account: bool,
    pub state: OpaqueState,
    pub created_at: DateTime<Utc>,
}
