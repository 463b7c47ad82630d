use chrono::{DateTime, Utc};
use ciborium::value::Value as CborValue;

use super::attestation::AttestationObject;
use super::cose::{CoseKey, SUPPORTED_ALGORITHMS};
use super::types::{
    AuthenticatorData, AuthenticatorSelection, ChallengeState, CredentialDescriptor,
    ParsedClientData, PUBLIC_KEY_TYPE, PubKeyCredParam, RegistrationOptions,
    RegistrationResponse, RelyingParty, StateKind, UserEntity, check_credential_type,
};
use crate::config::{ResidentKey, RpConfig};
use crate::gateway::{GatewayError, VerifiedRegistration};
use crate::store::{CredentialId, User};
use crate::utils::{base64url_decode, base64url_encode};

pub(super) fn registration_options(
    config: &RpConfig,
    user: &User,
    challenge: &str,
    exclude: &[String],
) -> RegistrationOptions {
    RegistrationOptions {
        challenge: challenge.to_string(),
        rp: RelyingParty {
            id: config.rp_id.clone(),
            name: config.rp_name.clone(),
        },
        user: UserEntity {
            id: user.user_handle.as_str().to_string(),
            name: user.username.clone(),
            display_name: user.display_name.clone(),
        },
        pub_key_cred_params: SUPPORTED_ALGORITHMS
            .iter()
            .map(|alg| PubKeyCredParam {
                type_: PUBLIC_KEY_TYPE.to_string(),
                alg: *alg,
            })
            .collect(),
        exclude_credentials: exclude
            .iter()
            .map(|id| CredentialDescriptor::public_key(id))
            .collect(),
        authenticator_selection: AuthenticatorSelection {
            resident_key: config.resident_key.as_str().to_string(),
            require_resident_key: config.resident_key == ResidentKey::Required,
            user_verification: config.user_verification.as_str().to_string(),
        },
        timeout: config.timeout.saturating_mul(1000),
        attestation: "none".to_string(),
    }
}

/// Verifies a `navigator.credentials.create()` response against the issued challenge.
///
/// 1. Client data: type, challenge, origin
/// 2. Authenticator data: RP ID hash, flags, attested credential
/// 3. Credential id matches `rawId`, public key is supported
/// 4. Attestation statement
pub(super) fn verify_registration_response(
    config: &RpConfig,
    state: &ChallengeState,
    client_response: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<VerifiedRegistration, GatewayError> {
    super::check_state(config, state, StateKind::Registration, now)?;

    let response: RegistrationResponse = serde_json::from_value(client_response.clone())
        .map_err(|e| GatewayError::Malformed(format!("Invalid registration response: {e}")))?;
    check_credential_type(response.type_.as_deref())?;

    let client_data = ParsedClientData::from_base64(&response.response.client_data_json)?;
    client_data.verify("webauthn.create", &state.challenge, config)?;

    let attestation = AttestationObject::from_base64(&response.response.attestation_object)?;
    let auth_data = AuthenticatorData::from_bytes(attestation.auth_data.clone())?;
    auth_data.verify(config)?;

    let (aaguid, credential_id, key_bytes) = auth_data.attested_credential()?;
    tracing::debug!("Authenticator AAGUID: {}", base64url_encode(aaguid));

    let raw_id = base64url_decode(&response.raw_id)
        .map_err(|e| GatewayError::Malformed(format!("rawId: {e}")))?;
    if raw_id != credential_id {
        return Err(GatewayError::VerificationFailed(
            "Credential ID does not match rawId".to_string(),
        ));
    }

    let key_cbor: CborValue = ciborium::de::from_reader(key_bytes)
        .map_err(|e| GatewayError::Malformed(format!("Invalid public key CBOR: {e}")))?;
    let credential_key = CoseKey::from_cbor(&key_cbor)?;

    attestation.verify(&credential_key, client_data.hash().as_ref())?;

    let mut public_key = Vec::new();
    ciborium::ser::into_writer(&key_cbor, &mut public_key)
        .map_err(|e| GatewayError::Internal(format!("Failed to encode public key: {e}")))?;

    Ok(VerifiedRegistration {
        credential_id: CredentialId::new(base64url_encode(credential_id)),
        public_key,
        signature_counter: auth_data.counter,
    })
}
