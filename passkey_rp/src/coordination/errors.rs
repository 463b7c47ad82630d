//! Error taxonomy exposed by the ceremony orchestrator

use thiserror::Error;

use crate::ceremony::CeremonyError;
use crate::gateway::GatewayError;
use crate::store::StoreError;
use crate::utils::UtilError;

/// Errors that can occur while coordinating ceremonies and passkey management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Missing or invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No pending ceremony for the session
    #[error("Session expired or missing")]
    SessionExpired,

    /// The client response failed verification
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Credential id or username already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found with context
    #[error("Resource not found: {resource_type} {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Deleting the credential would leave the user without passkeys
    #[error("Cannot delete the last passkey")]
    LastCredential,

    /// Uniform failure of an authentication ceremony
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The operation needs an authenticated user
    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinationError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Validation(msg) => tracing::error!("Validation error: {}", msg),
            Self::SessionExpired => tracing::error!("Session expired or missing"),
            Self::VerificationFailed(msg) => tracing::error!("Verification failed: {}", msg),
            Self::Conflict(msg) => tracing::error!("Conflict: {}", msg),
            Self::ResourceNotFound {
                resource_type,
                resource_id,
            } => tracing::error!("Resource not found: {} {}", resource_type, resource_id),
            Self::LastCredential => tracing::error!("Cannot delete the last passkey"),
            Self::AuthenticationFailed => tracing::error!("Authentication failed"),
            Self::Unauthorized => tracing::error!("Unauthorized access"),
            Self::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }
        self
    }

    pub(crate) fn not_found(resource_type: &str, resource_id: &str) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        }
    }
}

// Custom From implementations that automatically log errors

impl From<StoreError> for CoordinationError {
    fn from(err: StoreError) -> Self {
        let error = match err {
            StoreError::UserNotFound(name) => Self::not_found("User", &name),
            StoreError::CredentialNotFound(id) => Self::not_found("Passkey", &id),
            StoreError::DuplicateCredential(id) => {
                Self::Conflict(format!("Credential {id} is already registered"))
            }
            StoreError::UserAlreadyRegistered(name) => {
                Self::Conflict(format!("Username {name} is already registered"))
            }
            StoreError::LastCredential => Self::LastCredential,
            StoreError::CounterRegression { .. } => Self::AuthenticationFailed,
            StoreError::Utils(msg) => Self::Internal(msg),
        };
        tracing::error!("{}", error);
        error
    }
}

impl From<GatewayError> for CoordinationError {
    fn from(err: GatewayError) -> Self {
        let error = match err {
            GatewayError::VerificationFailed(msg) | GatewayError::Malformed(msg) => {
                Self::VerificationFailed(msg)
            }
            GatewayError::ChallengeExpired => {
                Self::VerificationFailed("Challenge expired".to_string())
            }
            GatewayError::Store(msg) | GatewayError::Internal(msg) => Self::Internal(msg),
        };
        tracing::error!("{}", error);
        error
    }
}

impl From<CeremonyError> for CoordinationError {
    fn from(err: CeremonyError) -> Self {
        tracing::error!("{}", err);
        Self::SessionExpired
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        let error = Self::Internal(err.to_string());
        tracing::error!("{}", error);
        error
    }
}
