//! Test doubles shared by unit tests

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ceremony::OpaqueState;
use crate::gateway::{
    Challenge, GatewayError, RelyingPartyGateway, VerifiedAssertion, VerifiedRegistration,
};
use crate::store::{CredentialId, User, UserHandle};

/// Gateway that trusts the response it is given.
///
/// Responses carry the outcome directly: `credentialId`, `counter`, `userHandle`,
/// and `fail: true` to simulate a verification failure.
pub(crate) struct MockGateway;

pub(crate) fn registration_response(credential_id: &str, counter: u32) -> Value {
    json!({ "credentialId": credential_id, "counter": counter })
}

pub(crate) fn assertion_response(credential_id: &str, user_handle: &str, counter: u32) -> Value {
    json!({ "credentialId": credential_id, "userHandle": user_handle, "counter": counter })
}

fn check(state: &OpaqueState, prefix: &str, response: &Value) -> Result<(), GatewayError> {
    if !state.as_str().starts_with(prefix) {
        return Err(GatewayError::VerificationFailed(
            "State issued for another ceremony".to_string(),
        ));
    }
    if response["fail"].as_bool().unwrap_or(false) {
        return Err(GatewayError::VerificationFailed("Bad signature".to_string()));
    }
    Ok(())
}

fn field<'a>(response: &'a Value, name: &str) -> Result<&'a str, GatewayError> {
    response[name]
        .as_str()
        .ok_or_else(|| GatewayError::Malformed(format!("missing {name}")))
}

#[async_trait]
impl RelyingPartyGateway for MockGateway {
    async fn create_registration_challenge(&self, user: &User) -> Result<Challenge, GatewayError> {
        Ok(Challenge {
            state: OpaqueState::new(format!("registration:{}", user.user_handle)),
            payload: json!({ "user": user.username }),
        })
    }

    async fn verify_registration(
        &self,
        state: &OpaqueState,
        client_response: &Value,
    ) -> Result<VerifiedRegistration, GatewayError> {
        check(state, "registration:", client_response)?;
        Ok(VerifiedRegistration {
            credential_id: CredentialId::from(field(client_response, "credentialId")?),
            public_key: vec![0xA5; 8],
            signature_counter: client_response["counter"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn create_assertion_challenge(
        &self,
        username: Option<&str>,
    ) -> Result<Challenge, GatewayError> {
        Ok(Challenge {
            state: OpaqueState::new(format!("authentication:{}", username.unwrap_or(""))),
            payload: json!({ "username": username }),
        })
    }

    async fn verify_assertion(
        &self,
        state: &OpaqueState,
        client_response: &Value,
    ) -> Result<VerifiedAssertion, GatewayError> {
        check(state, "authentication:", client_response)?;
        Ok(VerifiedAssertion {
            user_handle: UserHandle::new(field(client_response, "userHandle")?.to_string()),
            credential_id: CredentialId::from(field(client_response, "credentialId")?),
            new_counter: client_response["counter"].as_u64().unwrap_or(0) as u32,
        })
    }
}
