//! passkey-rp - Passkey relying-party core
//!
//! Keeps users and their passkeys in a concurrent in-memory store, tracks one
//! pending WebAuthn ceremony per caller session, and drives the start/finish
//! registration and authentication protocols through a pluggable gateway.

mod ceremony;
mod config;
mod coordination;
mod gateway;
mod store;
mod utils;

#[cfg(test)]
mod test_utils;

pub use ceremony::{CeremonyError, CeremonyKind, CeremonySessionManager, OpaqueState, PendingCeremony};
pub use config::{ConfigError, CounterPolicy, ResidentKey, RpConfig, UserVerification};
pub use coordination::{
    AuthenticationOutcome, CeremonyOrchestrator, CoordinationError, RegistrationMode,
    RegistrationOutcome, RegistrationStartRequest, UserProfile,
};
pub use gateway::{
    Challenge, GatewayError, RelyingPartyGateway, VerifiedAssertion, VerifiedRegistration,
    WebAuthnGateway,
};
pub use store::{
    CounterStatus, CounterUpdate, Credential, CredentialId, CredentialInfo, CredentialStore,
    InMemoryCredentialStore, StoreError, User, UserHandle,
};
pub use utils::{UtilError, gen_random_string};
