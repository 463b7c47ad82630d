use chrono::{DateTime, Utc};

use super::cose::CoseKey;
use super::types::{
    AssertionResponse, AuthenticationOptions, AuthenticatorData, ChallengeState,
    CredentialDescriptor, ParsedClientData, StateKind, check_credential_type,
};
use crate::config::RpConfig;
use crate::gateway::{GatewayError, VerifiedAssertion};
use crate::store::{CredentialId, CredentialStore, UserHandle};
use crate::utils::{base64url_decode, base64url_encode};

pub(super) fn authentication_options(
    config: &RpConfig,
    challenge: &str,
    allow: &[String],
) -> AuthenticationOptions {
    AuthenticationOptions {
        challenge: challenge.to_string(),
        timeout: config.timeout.saturating_mul(1000),
        rp_id: config.rp_id.clone(),
        allow_credentials: allow
            .iter()
            .map(|id| CredentialDescriptor::public_key(id))
            .collect(),
        user_verification: config.user_verification.as_str().to_string(),
    }
}

/// Verifies a `navigator.credentials.get()` response against the issued challenge.
///
/// The counter is reported as received; the store decides what a non-increasing
/// counter means.
pub(super) async fn verify_assertion_response(
    config: &RpConfig,
    store: &dyn CredentialStore,
    state: &ChallengeState,
    client_response: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<VerifiedAssertion, GatewayError> {
    super::check_state(config, state, StateKind::Authentication, now)?;

    let response: AssertionResponse = serde_json::from_value(client_response.clone())
        .map_err(|e| GatewayError::Malformed(format!("Invalid assertion response: {e}")))?;
    check_credential_type(response.type_.as_deref())?;

    let raw_id = base64url_decode(&response.raw_id)
        .map_err(|e| GatewayError::Malformed(format!("rawId: {e}")))?;
    let credential_id = CredentialId::new(base64url_encode(&raw_id));

    if !state.credential_ids.is_empty()
        && !state
            .credential_ids
            .iter()
            .any(|id| id == credential_id.as_str())
    {
        return Err(GatewayError::VerificationFailed(
            "Credential was not offered for this challenge".to_string(),
        ));
    }

    let owner = resolve_owner(state, response.response.user_handle.as_deref())?;

    let credential = store
        .lookup_credential_for_owner(&credential_id, &owner)
        .await
        .map_err(|e| {
            tracing::debug!("Credential lookup failed: {}", e);
            GatewayError::VerificationFailed("Unknown credential".to_string())
        })?;

    let client_data = ParsedClientData::from_base64(&response.response.client_data_json)?;
    client_data.verify("webauthn.get", &state.challenge, config)?;

    let auth_data_bytes = base64url_decode(&response.response.authenticator_data)
        .map_err(|e| GatewayError::Malformed(format!("authenticatorData: {e}")))?;
    let auth_data = AuthenticatorData::from_bytes(auth_data_bytes)?;
    auth_data.verify(config)?;

    let signature = base64url_decode(&response.response.signature)
        .map_err(|e| GatewayError::Malformed(format!("signature: {e}")))?;

    let mut signed_data = auth_data.raw_data.clone();
    signed_data.extend_from_slice(client_data.hash().as_ref());

    let key = CoseKey::from_bytes(&credential.public_key)?;
    key.verify(&signed_data, &signature)?;

    tracing::debug!(
        credential_id = %credential_id,
        counter = auth_data.counter,
        "Assertion signature verified"
    );

    Ok(VerifiedAssertion {
        user_handle: owner,
        credential_id,
        new_counter: auth_data.counter,
    })
}

/// Picks the credential owner from the issued challenge and the returned user handle.
///
/// A named challenge fixes the owner; a discoverable one relies on the authenticator's
/// user handle. When both are present they must agree. A challenge issued for a
/// username that did not resolve to a user never succeeds.
fn resolve_owner(
    state: &ChallengeState,
    returned_handle: Option<&str>,
) -> Result<UserHandle, GatewayError> {
    if state.username.is_some() && state.user_handle.is_none() {
        return Err(GatewayError::VerificationFailed("Unknown user".to_string()));
    }

    let returned_handle = returned_handle.filter(|h| !h.is_empty());
    match (state.user_handle.as_deref(), returned_handle) {
        (Some(expected), Some(returned)) if expected != returned => {
            tracing::error!("User handle mismatch: {} != {}", returned, expected);
            Err(GatewayError::VerificationFailed(
                "User handle mismatch".to_string(),
            ))
        }
        (Some(expected), _) => Ok(UserHandle::new(expected.to_string())),
        (None, Some(returned)) => Ok(UserHandle::new(returned.to_string())),
        (None, None) => Err(GatewayError::VerificationFailed(
            "Missing user handle for discoverable credential".to_string(),
        )),
    }
}
