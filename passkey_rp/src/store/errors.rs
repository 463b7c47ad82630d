use thiserror::Error;

use crate::utils::UtilError;

/// Typed outcomes of credential store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No user is registered under the given username or user handle
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The credential does not exist, or is not owned by the given user
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// The credential id is already registered, possibly to another user
    #[error("Duplicate credential: {0}")]
    DuplicateCredential(String),

    /// A new account was requested but the user already owns a credential
    #[error("User already has credentials: {0}")]
    UserAlreadyRegistered(String),

    /// Deleting the credential would leave the user without any credential
    #[error("Cannot delete the last credential of a user")]
    LastCredential,

    /// The reported signature counter did not increase and the policy rejects it
    #[error("Signature counter did not increase (stored: {stored}, received: {received})")]
    CounterRegression { stored: u32, received: u32 },

    #[error("Utils error: {0}")]
    Utils(String),
}

impl From<UtilError> for StoreError {
    fn from(err: UtilError) -> Self {
        Self::Utils(err.to_string())
    }
}
