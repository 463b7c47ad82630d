use thiserror::Error;

use crate::store::StoreError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The response does not prove what it claims (challenge, origin, signature, ...)
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// The client response could not be decoded
    #[error("Malformed client response: {0}")]
    Malformed(String),

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<UtilError> for GatewayError {
    fn from(err: UtilError) -> Self {
        match err {
            UtilError::Format(msg) => Self::Malformed(msg),
            UtilError::Crypto(msg) => Self::Internal(msg),
        }
    }
}
