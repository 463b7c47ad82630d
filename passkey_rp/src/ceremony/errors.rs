use thiserror::Error;

use super::types::CeremonyKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    /// Nothing of the requested kind is pending for the session: never started,
    /// already consumed, or discarded with the caller's session
    #[error("No pending {0} ceremony for this session")]
    ExpiredOrMissing(CeremonyKind),
}
