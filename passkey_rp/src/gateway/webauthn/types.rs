use chrono::{DateTime, Utc};
use ring::digest;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::{RpConfig, UserVerification};
use crate::gateway::GatewayError;
use crate::utils::base64url_decode;

pub(super) const PUBLIC_KEY_TYPE: &str = "public-key";

/// What the gateway remembers between start and finish, serialized into the opaque state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(super) struct ChallengeState {
    pub(super) ceremony: StateKind,
    pub(super) challenge: String,
    pub(super) user_handle: Option<String>,
    pub(super) username: Option<String>,
    /// excludeCredentials for registration, allowCredentials for authentication
    pub(super) credential_ids: Vec<String>,
    pub(super) issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(super) enum StateKind {
    Registration,
    Authentication,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegistrationOptions {
    pub(super) challenge: String,
    pub(super) rp: RelyingParty,
    pub(super) user: UserEntity,
    pub(super) pub_key_cred_params: Vec<PubKeyCredParam>,
    pub(super) exclude_credentials: Vec<CredentialDescriptor>,
    pub(super) authenticator_selection: AuthenticatorSelection,
    pub(super) timeout: u32,
    pub(super) attestation: String,
}

#[derive(Serialize, Debug)]
pub(super) struct RelyingParty {
    pub(super) id: String,
    pub(super) name: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserEntity {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) display_name: String,
}

#[derive(Serialize, Debug)]
pub(super) struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) alg: i64,
}

#[derive(Serialize, Debug)]
pub(super) struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) id: String,
}

impl CredentialDescriptor {
    pub(super) fn public_key(id: &str) -> Self {
        Self {
            type_: PUBLIC_KEY_TYPE.to_string(),
            id: id.to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorSelection {
    pub(super) resident_key: String,
    pub(super) require_resident_key: bool,
    pub(super) user_verification: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticationOptions {
    pub(super) challenge: String,
    pub(super) timeout: u32,
    pub(super) rp_id: String,
    pub(super) allow_credentials: Vec<CredentialDescriptor>,
    pub(super) user_verification: String,
}

/// `PublicKeyCredential` returned by `navigator.credentials.create()`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegistrationResponse {
    pub(super) raw_id: String,
    pub(super) response: AttestationResponse,
    #[serde(rename = "type", default)]
    pub(super) type_: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    #[serde(rename = "attestationObject")]
    pub(super) attestation_object: String,
}

/// `PublicKeyCredential` returned by `navigator.credentials.get()`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssertionResponse {
    pub(super) raw_id: String,
    pub(super) response: AssertionData,
    #[serde(rename = "type", default)]
    pub(super) type_: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct AssertionData {
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub(super) authenticator_data: String,
    pub(super) signature: String,
    #[serde(rename = "userHandle", default)]
    pub(super) user_handle: Option<String>,
}

pub(super) fn check_credential_type(type_: Option<&str>) -> Result<(), GatewayError> {
    match type_ {
        None | Some(PUBLIC_KEY_TYPE) => Ok(()),
        Some(other) => Err(GatewayError::Malformed(format!(
            "Unexpected credential type: {other}"
        ))),
    }
}

#[derive(Debug)]
pub(super) struct ParsedClientData {
    pub(super) challenge: String,
    pub(super) origin: String,
    pub(super) type_: String,
    pub(super) raw_data: Vec<u8>,
}

impl ParsedClientData {
    pub(super) fn from_base64(client_data_json: &str) -> Result<Self, GatewayError> {
        let raw_data = base64url_decode(client_data_json)
            .map_err(|e| GatewayError::Malformed(format!("clientDataJSON: {e}")))?;

        let data: serde_json::Value = serde_json::from_slice(&raw_data)
            .map_err(|e| GatewayError::Malformed(format!("Invalid client data JSON: {e}")))?;

        let field = |name: &str| {
            data[name]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Malformed(format!("Client data is missing {name}")))
        };

        Ok(Self {
            challenge: field("challenge")?,
            origin: field("origin")?,
            type_: field("type")?,
            raw_data,
        })
    }

    pub(super) fn verify(
        &self,
        expected_type: &str,
        expected_challenge: &str,
        config: &RpConfig,
    ) -> Result<(), GatewayError> {
        if self.type_ != expected_type {
            return Err(GatewayError::VerificationFailed(format!(
                "Invalid client data type. Expected '{}', got '{}'",
                expected_type, self.type_
            )));
        }

        let matches: bool = self
            .challenge
            .as_bytes()
            .ct_eq(expected_challenge.as_bytes())
            .into();
        if !matches {
            return Err(GatewayError::VerificationFailed(
                "Challenge mismatch".to_string(),
            ));
        }

        if !config.is_allowed_origin(&self.origin) {
            return Err(GatewayError::VerificationFailed(format!(
                "Invalid origin: {}",
                self.origin
            )));
        }

        Ok(())
    }

    pub(super) fn hash(&self) -> digest::Digest {
        digest::digest(&digest::SHA256, &self.raw_data)
    }
}

/// Flags byte of the authenticator data
mod flags {
    pub(super) const UP: u8 = 1 << 0;
    pub(super) const UV: u8 = 1 << 2;
    pub(super) const BE: u8 = 1 << 3;
    pub(super) const BS: u8 = 1 << 4;
    pub(super) const AT: u8 = 1 << 6;
    pub(super) const ED: u8 = 1 << 7;
}

/// Authenticator data.
///
/// Layout (minimum 37 bytes):
/// - RP ID hash (32 bytes)
/// - Flags (1 byte)
/// - Signature counter (4 bytes, big-endian)
/// - Attested credential data, when the AT flag is set
/// - Extensions, when the ED flag is set
#[derive(Debug)]
pub(super) struct AuthenticatorData {
    pub(super) rp_id_hash: Vec<u8>,
    pub(super) flags: u8,
    pub(super) counter: u32,
    pub(super) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    pub(super) fn from_bytes(data: Vec<u8>) -> Result<Self, GatewayError> {
        if data.len() < 37 {
            return Err(GatewayError::Malformed(
                "Authenticator data too short".to_string(),
            ));
        }

        Ok(Self {
            rp_id_hash: data[..32].to_vec(),
            flags: data[32],
            counter: u32::from_be_bytes([data[33], data[34], data[35], data[36]]),
            raw_data: data,
        })
    }

    pub(super) fn is_user_present(&self) -> bool {
        (self.flags & flags::UP) != 0
    }

    pub(super) fn is_user_verified(&self) -> bool {
        (self.flags & flags::UV) != 0
    }

    pub(super) fn is_backup_eligible(&self) -> bool {
        (self.flags & flags::BE) != 0
    }

    pub(super) fn is_backed_up(&self) -> bool {
        (self.flags & flags::BS) != 0
    }

    pub(super) fn has_attested_credential_data(&self) -> bool {
        (self.flags & flags::AT) != 0
    }

    pub(super) fn has_extension_data(&self) -> bool {
        (self.flags & flags::ED) != 0
    }

    /// Checks the RP ID hash, user presence, and user verification when required.
    pub(super) fn verify(&self, config: &RpConfig) -> Result<(), GatewayError> {
        let expected_hash = digest::digest(&digest::SHA256, config.rp_id.as_bytes());
        if self.rp_id_hash != expected_hash.as_ref() {
            return Err(GatewayError::VerificationFailed(
                "Invalid RP ID hash".to_string(),
            ));
        }

        if !self.is_user_present() {
            return Err(GatewayError::VerificationFailed(
                "User not present".to_string(),
            ));
        }

        if config.user_verification == UserVerification::Required && !self.is_user_verified() {
            return Err(GatewayError::VerificationFailed(format!(
                "User verification required but flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        tracing::debug!(
            user_verified = self.is_user_verified(),
            backup_eligible = self.is_backup_eligible(),
            backed_up = self.is_backed_up(),
            extensions = self.has_extension_data(),
            "Authenticator data verified"
        );
        Ok(())
    }

    /// Splits the attested credential data into (aaguid, credential id, COSE key bytes).
    ///
    /// The key slice may be followed by extension data.
    pub(super) fn attested_credential(&self) -> Result<(&[u8], &[u8], &[u8]), GatewayError> {
        if !self.has_attested_credential_data() {
            return Err(GatewayError::VerificationFailed(
                "No attested credential data present".to_string(),
            ));
        }

        let data = &self.raw_data;
        let mut pos = 37;
        if data.len() < pos + 18 {
            return Err(GatewayError::Malformed(
                "Attested credential data too short".to_string(),
            ));
        }

        let aaguid = &data[pos..pos + 16];
        pos += 16;

        let cred_id_len = ((data[pos] as usize) << 8) | (data[pos + 1] as usize);
        pos += 2;

        if cred_id_len == 0 || cred_id_len > 1023 {
            return Err(GatewayError::Malformed(format!(
                "Invalid credential ID length: {cred_id_len}"
            )));
        }
        if data.len() < pos + cred_id_len {
            return Err(GatewayError::Malformed(
                "Authenticator data too short for credential ID".to_string(),
            ));
        }

        let credential_id = &data[pos..pos + cred_id_len];
        pos += cred_id_len;

        Ok((aaguid, credential_id, &data[pos..]))
    }
}
