//! Relying-party cryptography behind a trait: challenge issuance and response verification.

mod errors;
mod webauthn;

use async_trait::async_trait;

use crate::ceremony::OpaqueState;
use crate::store::{CredentialId, User, UserHandle};

pub use errors::GatewayError;
pub use webauthn::WebAuthnGateway;

/// A freshly issued challenge.
///
/// `state` goes to the ceremony session manager and comes back unchanged on finish;
/// `payload` goes to the client.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub state: OpaqueState,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRegistration {
    pub credential_id: CredentialId,
    pub public_key: Vec<u8>,
    pub signature_counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub user_handle: UserHandle,
    pub credential_id: CredentialId,
    pub new_counter: u32,
}

#[async_trait]
pub trait RelyingPartyGateway: Send + Sync + 'static {
    async fn create_registration_challenge(&self, user: &User) -> Result<Challenge, GatewayError>;

    async fn verify_registration(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
    ) -> Result<VerifiedRegistration, GatewayError>;

    /// `username` is `None` for discoverable authentication.
    async fn create_assertion_challenge(
        &self,
        username: Option<&str>,
    ) -> Result<Challenge, GatewayError>;

    async fn verify_assertion(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
    ) -> Result<VerifiedAssertion, GatewayError>;
}
