use ciborium::value::Value as CborValue;

use super::cose::CoseKey;
use crate::gateway::GatewayError;
use crate::utils::base64url_decode;

#[derive(Debug)]
pub(super) struct AttestationObject {
    pub(super) fmt: String,
    pub(super) auth_data: Vec<u8>,
    pub(super) att_stmt: Vec<(CborValue, CborValue)>,
}

impl AttestationObject {
    pub(super) fn from_base64(attestation_object: &str) -> Result<Self, GatewayError> {
        let bytes = base64url_decode(attestation_object)
            .map_err(|e| GatewayError::Malformed(format!("attestationObject: {e}")))?;

        let cbor: CborValue = ciborium::de::from_reader(&bytes[..])
            .map_err(|e| GatewayError::Malformed(format!("Invalid CBOR data: {e}")))?;

        let CborValue::Map(map) = cbor else {
            return Err(GatewayError::Malformed(
                "Invalid attestation format".to_string(),
            ));
        };

        let mut fmt = None;
        let mut auth_data = None;
        let mut att_stmt = None;

        for (key, value) in map {
            if let CborValue::Text(k) = key {
                match (k.as_str(), value) {
                    ("fmt", CborValue::Text(f)) => fmt = Some(f),
                    ("authData", CborValue::Bytes(d)) => auth_data = Some(d),
                    ("attStmt", CborValue::Map(s)) => att_stmt = Some(s),
                    _ => {}
                }
            }
        }

        match (fmt, auth_data, att_stmt) {
            (Some(fmt), Some(auth_data), Some(att_stmt)) => Ok(Self {
                fmt,
                auth_data,
                att_stmt,
            }),
            _ => Err(GatewayError::Malformed(
                "Missing required attestation data".to_string(),
            )),
        }
    }

    /// Checks the attestation statement against the credential key it introduces.
    ///
    /// `none` and `packed` self attestation are verified. Statements carrying a
    /// certificate chain are accepted as untrusted attestation, since no trust
    /// anchors are configured.
    pub(super) fn verify(
        &self,
        credential_key: &CoseKey,
        client_data_hash: &[u8],
    ) -> Result<(), GatewayError> {
        match self.fmt.as_str() {
            "none" => {
                if !self.att_stmt.is_empty() {
                    return Err(GatewayError::VerificationFailed(
                        "attStmt must be empty for none attestation".to_string(),
                    ));
                }
                Ok(())
            }
            "packed" => self.verify_packed(credential_key, client_data_hash),
            other => {
                tracing::warn!(
                    "Accepting '{}' attestation without verifying its statement",
                    other
                );
                Ok(())
            }
        }
    }

    fn verify_packed(
        &self,
        credential_key: &CoseKey,
        client_data_hash: &[u8],
    ) -> Result<(), GatewayError> {
        let mut alg = None;
        let mut sig = None;
        let mut has_x5c = false;

        for (key, value) in &self.att_stmt {
            match (key, value) {
                (CborValue::Text(k), CborValue::Integer(a)) if k == "alg" => {
                    alg = i64::try_from(*a).ok();
                }
                (CborValue::Text(k), CborValue::Bytes(s)) if k == "sig" => {
                    sig = Some(s.as_slice());
                }
                (CborValue::Text(k), CborValue::Array(_)) if k == "x5c" => {
                    has_x5c = true;
                }
                _ => {}
            }
        }

        let (Some(alg), Some(sig)) = (alg, sig) else {
            return Err(GatewayError::VerificationFailed(
                "Missing algorithm or signature in attestation statement".to_string(),
            ));
        };

        if has_x5c {
            tracing::warn!("Accepting packed attestation with certificate chain as untrusted");
            return Ok(());
        }

        // Self attestation: signed by the credential key itself
        if alg != credential_key.algorithm() {
            return Err(GatewayError::VerificationFailed(format!(
                "Self attestation algorithm {} does not match credential key algorithm {}",
                alg,
                credential_key.algorithm()
            )));
        }

        let mut signed_data = Vec::with_capacity(self.auth_data.len() + client_data_hash.len());
        signed_data.extend_from_slice(&self.auth_data);
        signed_data.extend_from_slice(client_data_hash);

        credential_key.verify(&signed_data, sig).map_err(|_| {
            GatewayError::VerificationFailed("Invalid self attestation signature".to_string())
        })
    }
}
