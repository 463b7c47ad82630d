//! Software authenticator producing WebAuthn responses the way a browser would relay them.

#![allow(dead_code)]

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::Value as CborValue;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
use serde_json::{Value, json};

use passkey_rp::{CeremonyOrchestrator, CounterPolicy, InMemoryCredentialStore, RpConfig};

pub const ORIGIN: &str = "https://example.com";
pub const RP_ID: &str = "example.com";

const FLAG_UP: u8 = 0x01;
const FLAG_UV: u8 = 0x04;
const FLAG_AT: u8 = 0x40;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Attestation {
    None,
    PackedSelf,
}

/// A P-256 authenticator holding one credential.
#[derive(Clone)]
pub struct SoftAuthenticator {
    pkcs8: Vec<u8>,
    pub credential_id: Vec<u8>,
    pub counter: u32,
    pub user_handle: Option<String>,
    pub origin: String,
    pub rp_id: String,
}

impl SoftAuthenticator {
    pub fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .unwrap()
            .as_ref()
            .to_vec();
        let mut credential_id = vec![0u8; 16];
        rng.fill(&mut credential_id).unwrap();

        Self {
            pkcs8,
            credential_id,
            counter: 0,
            user_handle: None,
            origin: ORIGIN.to_string(),
            rp_id: RP_ID.to_string(),
        }
    }

    pub fn credential_id_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.credential_id)
    }

    fn key_pair(&self) -> EcdsaKeyPair {
        EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING,
            &self.pkcs8,
            &SystemRandom::new(),
        )
        .unwrap()
    }

    fn sign(&self, auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
        let mut signed = auth_data.to_vec();
        signed.extend_from_slice(digest::digest(&digest::SHA256, client_data_json).as_ref());
        self.key_pair()
            .sign(&SystemRandom::new(), &signed)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    fn cose_key(&self) -> CborValue {
        let key_pair = self.key_pair();
        let point = key_pair.public_key().as_ref();
        CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-7).into())),
            (CborValue::Integer((-1).into()), CborValue::Integer(1.into())),
            (
                CborValue::Integer((-2).into()),
                CborValue::Bytes(point[1..33].to_vec()),
            ),
            (
                CborValue::Integer((-3).into()),
                CborValue::Bytes(point[33..65].to_vec()),
            ),
        ])
    }

    fn client_data(&self, type_: &str, options: &Value) -> Vec<u8> {
        json!({
            "type": type_,
            "challenge": options["publicKey"]["challenge"],
            "origin": self.origin,
            "crossOrigin": false
        })
        .to_string()
        .into_bytes()
    }

    fn rp_id_hash(&self) -> Vec<u8> {
        digest::digest(&digest::SHA256, self.rp_id.as_bytes())
            .as_ref()
            .to_vec()
    }

    /// Answers registration options like `navigator.credentials.create()`.
    pub fn create(&mut self, options: &Value, attestation: Attestation) -> Value {
        let user_handle = options["publicKey"]["user"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        self.user_handle = Some(user_handle);

        let client_data = self.client_data("webauthn.create", options);

        let mut auth_data = self.rp_id_hash();
        auth_data.push(FLAG_UP | FLAG_UV | FLAG_AT);
        auth_data.extend_from_slice(&self.counter.to_be_bytes());
        auth_data.extend_from_slice(&[0u8; 16]);
        auth_data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
        auth_data.extend_from_slice(&self.credential_id);
        ciborium::ser::into_writer(&self.cose_key(), &mut auth_data).unwrap();

        let (fmt, att_stmt) = match attestation {
            Attestation::None => ("none", vec![]),
            Attestation::PackedSelf => (
                "packed",
                vec![
                    (
                        CborValue::Text("alg".into()),
                        CborValue::Integer((-7).into()),
                    ),
                    (
                        CborValue::Text("sig".into()),
                        CborValue::Bytes(self.sign(&auth_data, &client_data)),
                    ),
                ],
            ),
        };

        let attestation_object = CborValue::Map(vec![
            (CborValue::Text("fmt".into()), CborValue::Text(fmt.into())),
            (CborValue::Text("attStmt".into()), CborValue::Map(att_stmt)),
            (CborValue::Text("authData".into()), CborValue::Bytes(auth_data)),
        ]);
        let mut attestation_bytes = Vec::new();
        ciborium::ser::into_writer(&attestation_object, &mut attestation_bytes).unwrap();

        json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data),
                "attestationObject": URL_SAFE_NO_PAD.encode(&attestation_bytes),
            }
        })
    }

    /// Answers authentication options like `navigator.credentials.get()`, bumping the counter.
    pub fn get(&mut self, options: &Value) -> Value {
        self.counter += 1;
        self.assert_with_counter(options, self.counter)
    }

    pub fn assert_with_counter(&self, options: &Value, counter: u32) -> Value {
        let client_data = self.client_data("webauthn.get", options);

        let mut auth_data = self.rp_id_hash();
        auth_data.push(FLAG_UP | FLAG_UV);
        auth_data.extend_from_slice(&counter.to_be_bytes());

        let signature = self.sign(&auth_data, &client_data);

        json!({
            "id": self.credential_id_b64(),
            "rawId": self.credential_id_b64(),
            "type": "public-key",
            "response": {
                "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data),
                "authenticatorData": URL_SAFE_NO_PAD.encode(&auth_data),
                "signature": URL_SAFE_NO_PAD.encode(&signature),
                "userHandle": self.user_handle,
            }
        })
    }
}

pub fn relying_party(policy: CounterPolicy) -> (CeremonyOrchestrator, Arc<InMemoryCredentialStore>) {
    let mut config = RpConfig::new(ORIGIN).unwrap();
    config.counter_policy = policy;
    let store = Arc::new(InMemoryCredentialStore::with_counter_policy(policy));
    (CeremonyOrchestrator::with_webauthn(config, store.clone()), store)
}

/// Registers a new authenticator for `username` through the full ceremony.
pub async fn register(
    orchestrator: &CeremonyOrchestrator,
    session_id: &str,
    username: &str,
) -> SoftAuthenticator {
    let mut authenticator = SoftAuthenticator::new();
    let options = orchestrator
        .start_registration(session_id, username, username)
        .await
        .unwrap();
    let response = authenticator.create(&options, Attestation::None);
    orchestrator
        .finish_registration(session_id, &response)
        .await
        .unwrap();
    authenticator
}
