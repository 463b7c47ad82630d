mod errors;
mod manager;
mod types;

pub use errors::CeremonyError;
pub use manager::CeremonySessionManager;
pub use types::{CeremonyKind, OpaqueState, PendingCeremony};
