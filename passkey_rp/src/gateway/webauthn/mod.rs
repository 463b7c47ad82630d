mod attestation;
mod auth;
mod cose;
mod register;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Challenge, GatewayError, RelyingPartyGateway, VerifiedAssertion, VerifiedRegistration};
use crate::ceremony::OpaqueState;
use crate::config::RpConfig;
use crate::store::{CredentialStore, StoreError, User};
use crate::utils::gen_random_string;

use types::{ChallengeState, StateKind};

const CHALLENGE_BYTES: usize = 32;

/// WebAuthn Level 2 relying party built on `ring`.
///
/// Reads existing credentials through the store to fill exclude/allow lists and to
/// fetch the public key for assertion checks. It never writes to the store.
pub struct WebAuthnGateway {
    config: RpConfig,
    store: Arc<dyn CredentialStore>,
}

impl WebAuthnGateway {
    pub fn new(config: RpConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RpConfig {
        &self.config
    }

    fn encode_state(state: &ChallengeState) -> Result<OpaqueState, GatewayError> {
        serde_json::to_string(state)
            .map(OpaqueState::new)
            .map_err(|e| GatewayError::Internal(format!("Failed to serialize state: {e}")))
    }

    fn decode_state(state: &OpaqueState) -> Result<ChallengeState, GatewayError> {
        serde_json::from_str(state.as_str())
            .map_err(|e| GatewayError::Internal(format!("Corrupted ceremony state: {e}")))
    }

    pub(crate) async fn verify_registration_at(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<VerifiedRegistration, GatewayError> {
        let state = Self::decode_state(state)?;
        register::verify_registration_response(&self.config, &state, client_response, now)
    }

    pub(crate) async fn verify_assertion_at(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<VerifiedAssertion, GatewayError> {
        let state = Self::decode_state(state)?;
        auth::verify_assertion_response(
            &self.config,
            self.store.as_ref(),
            &state,
            client_response,
            now,
        )
        .await
    }
}

/// Rejects state of the wrong ceremony or older than the configured challenge timeout.
fn check_state(
    config: &RpConfig,
    state: &ChallengeState,
    expected: StateKind,
    now: DateTime<Utc>,
) -> Result<(), GatewayError> {
    if state.ceremony != expected {
        return Err(GatewayError::VerificationFailed(
            "Challenge was issued for another ceremony".to_string(),
        ));
    }

    let max_age =
        chrono::Duration::from_std(config.challenge_timeout).unwrap_or(chrono::TimeDelta::MAX);
    if now.signed_duration_since(state.issued_at) > max_age {
        tracing::debug!("Challenge issued at {} has expired", state.issued_at);
        return Err(GatewayError::ChallengeExpired);
    }
    Ok(())
}

#[async_trait]
impl RelyingPartyGateway for WebAuthnGateway {
    async fn create_registration_challenge(&self, user: &User) -> Result<Challenge, GatewayError> {
        let challenge = gen_random_string(CHALLENGE_BYTES)?;

        let exclude: Vec<String> = self
            .store
            .credential_ids_for_user(&user.user_handle)
            .await?
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();

        let options = register::registration_options(&self.config, user, &challenge, &exclude);
        tracing::debug!("Registration options: {:?}", options);

        let state = Self::encode_state(&ChallengeState {
            ceremony: StateKind::Registration,
            challenge,
            user_handle: Some(user.user_handle.as_str().to_string()),
            username: Some(user.username.clone()),
            credential_ids: exclude,
            issued_at: Utc::now(),
        })?;

        Ok(Challenge {
            state,
            payload: serde_json::json!({ "publicKey": options }),
        })
    }

    async fn verify_registration(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
    ) -> Result<VerifiedRegistration, GatewayError> {
        self.verify_registration_at(state, client_response, Utc::now())
            .await
    }

    async fn create_assertion_challenge(
        &self,
        username: Option<&str>,
    ) -> Result<Challenge, GatewayError> {
        let challenge = gen_random_string(CHALLENGE_BYTES)?;

        let (user_handle, allow) = match username {
            Some(name) => match self.store.find_user_handle(name).await {
                Ok(handle) => {
                    let allow = self
                        .store
                        .credential_ids_for_user(&handle)
                        .await?
                        .into_iter()
                        .map(|id| id.as_str().to_string())
                        .collect();
                    (Some(handle.as_str().to_string()), allow)
                }
                Err(StoreError::UserNotFound(_)) => {
                    // Same payload shape as for a known user, so usernames can't be probed
                    tracing::warn!("Authentication started for unknown username: {}", name);
                    (None, Vec::new())
                }
                Err(e) => return Err(e.into()),
            },
            None => (None, Vec::new()),
        };

        let options = auth::authentication_options(&self.config, &challenge, &allow);
        tracing::debug!("Authentication options: {:?}", options);

        let state = Self::encode_state(&ChallengeState {
            ceremony: StateKind::Authentication,
            challenge,
            user_handle,
            username: username.map(str::to_string),
            credential_ids: allow,
            issued_at: Utc::now(),
        })?;

        Ok(Challenge {
            state,
            payload: serde_json::json!({ "publicKey": options }),
        })
    }

    async fn verify_assertion(
        &self,
        state: &OpaqueState,
        client_response: &serde_json::Value,
    ) -> Result<VerifiedAssertion, GatewayError> {
        self.verify_assertion_at(state, client_response, Utc::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;

    async fn gateway() -> (WebAuthnGateway, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let config = RpConfig::new("https://example.com").unwrap();
        (WebAuthnGateway::new(config, store.clone()), store)
    }

    #[tokio::test]
    async fn test_registration_payload_shape() {
        let (gateway, store) = gateway().await;
        let (user, _) = store.get_or_create_user("alice", "Alice A").await.unwrap();
        store
            .add_credential(&user.user_handle, "existing".into(), vec![1], 0)
            .await
            .unwrap();

        let challenge = gateway.create_registration_challenge(&user).await.unwrap();
        let options = &challenge.payload["publicKey"];

        assert_eq!(options["rp"]["id"], "example.com");
        assert_eq!(options["user"]["id"], user.user_handle.as_str());
        assert_eq!(options["user"]["name"], "alice");
        assert_eq!(options["user"]["displayName"], "Alice A");
        assert_eq!(options["challenge"].as_str().unwrap().len(), 43);
        assert_eq!(options["pubKeyCredParams"][0]["alg"], -7);
        assert_eq!(options["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(options["excludeCredentials"][0]["id"], "existing");
        assert_eq!(options["authenticatorSelection"]["residentKey"], "required");
        assert_eq!(options["timeout"], 60000);
        assert_eq!(options["attestation"], "none");

        let state = WebAuthnGateway::decode_state(&challenge.state).unwrap();
        assert_eq!(state.ceremony, StateKind::Registration);
        assert_eq!(state.challenge, options["challenge"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_assertion_payload_for_unknown_user_looks_discoverable() {
        let (gateway, _) = gateway().await;

        let challenge = gateway.create_assertion_challenge(Some("ghost")).await.unwrap();
        let options = &challenge.payload["publicKey"];

        assert_eq!(options["rpId"], "example.com");
        assert_eq!(options["allowCredentials"].as_array().unwrap().len(), 0);
        assert_eq!(options["userVerification"], "preferred");
    }

    #[tokio::test]
    async fn test_assertion_payload_lists_user_credentials() {
        let (gateway, store) = gateway().await;
        let (user, _) = store.get_or_create_user("bob", "Bob").await.unwrap();
        for id in ["k1", "k2"] {
            store
                .add_credential(&user.user_handle, id.into(), vec![1], 0)
                .await
                .unwrap();
        }

        let challenge = gateway.create_assertion_challenge(Some("bob")).await.unwrap();
        let allow = challenge.payload["publicKey"]["allowCredentials"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(allow.len(), 2);
        assert_eq!(allow[1]["id"], "k2");

        let state = WebAuthnGateway::decode_state(&challenge.state).unwrap();
        assert_eq!(state.user_handle.as_deref(), Some(user.user_handle.as_str()));
    }

    #[tokio::test]
    async fn test_expired_and_mismatched_state_is_rejected() {
        let (gateway, _) = gateway().await;
        let challenge = gateway.create_assertion_challenge(None).await.unwrap();
        let response = serde_json::json!({});

        let later = Utc::now() + chrono::Duration::seconds(301);
        assert_eq!(
            gateway
                .verify_assertion_at(&challenge.state, &response, later)
                .await,
            Err(GatewayError::ChallengeExpired)
        );

        assert!(matches!(
            gateway.verify_registration(&challenge.state, &response).await,
            Err(GatewayError::VerificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_challenge_timeout_never_expires() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let mut config = RpConfig::new("https://example.com").unwrap();
        config.challenge_timeout = std::time::Duration::from_secs(u64::MAX);
        let gateway = WebAuthnGateway::new(config, store);

        let challenge = gateway.create_assertion_challenge(None).await.unwrap();
        let much_later = Utc::now() + chrono::Duration::days(365 * 100);
        let result = gateway
            .verify_assertion_at(&challenge.state, &serde_json::json!({}), much_later)
            .await;
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_corrupted_state() {
        let (gateway, _) = gateway().await;
        let state = OpaqueState::new("not json".to_string());
        assert!(matches!(
            gateway
                .verify_assertion(&state, &serde_json::json!({}))
                .await,
            Err(GatewayError::Internal(_))
        ));
    }
}
