//! Fixtures for handler tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use serde_json::{Value, json};

use passkey_rp::{
    CeremonyOrchestrator, CeremonySessionManager, Challenge, CredentialId, GatewayError,
    InMemoryCredentialStore, OpaqueState, RelyingPartyGateway, User, UserHandle,
    VerifiedAssertion, VerifiedRegistration,
};

use crate::session::{AuthUser, CallerSession};
use crate::state::AppState;

/// Gateway that accepts whatever outcome the response carries.
struct MockGateway;

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
            payload: json!({ "publicKey": { "user": { "name": user.username } } }),
        })
    }

    async fn verify_registration(
        &self,
        _state: &OpaqueState,
        client_response: &Value,
    ) -> Result<VerifiedRegistration, GatewayError> {
        Ok(VerifiedRegistration {
            credential_id: CredentialId::from(field(client_response, "credentialId")?),
            public_key: vec![0x5A; 8],
            signature_counter: 0,
        })
    }

    async fn create_assertion_challenge(
        &self,
        username: Option<&str>,
    ) -> Result<Challenge, GatewayError> {
        Ok(Challenge {
            state: OpaqueState::new(format!("authentication:{}", username.unwrap_or(""))),
            payload: json!({ "publicKey": { "allowCredentials": [] } }),
        })
    }

    async fn verify_assertion(
        &self,
        _state: &OpaqueState,
        client_response: &Value,
    ) -> Result<VerifiedAssertion, GatewayError> {
        Ok(VerifiedAssertion {
            user_handle: UserHandle::new(field(client_response, "userHandle")?.to_string()),
            credential_id: CredentialId::from(field(client_response, "credentialId")?),
            new_counter: client_response["counter"].as_u64().unwrap_or(0) as u32,
        })
    }
}

pub(crate) fn state_with_mock() -> AppState {
    let orchestrator = CeremonyOrchestrator::new(
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(CeremonySessionManager::new()),
        Arc::new(MockGateway),
    );
    AppState::with_session_ttl(orchestrator, 600)
}

pub(crate) fn registration(credential_id: &str) -> Value {
    json!({ "credentialId": credential_id })
}

pub(crate) fn assertion(credential_id: &str, user_handle: &str, counter: u32) -> Value {
    json!({ "credentialId": credential_id, "userHandle": user_handle, "counter": counter })
}

/// An anonymous caller session already known to the session table.
pub(crate) fn caller(state: &AppState) -> CallerSession {
    let id = state.sessions().create(None, Utc::now()).unwrap();
    CallerSession {
        id,
        username: None,
        headers: HeaderMap::new(),
    }
}

pub(crate) fn authenticated(state: &AppState, username: &str) -> AuthUser {
    let session_id = state
        .sessions()
        .create(Some(username.to_string()), Utc::now())
        .unwrap();
    AuthUser {
        session_id,
        username: username.to_string(),
    }
}
