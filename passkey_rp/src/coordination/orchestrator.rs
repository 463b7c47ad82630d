use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::errors::CoordinationError;
use super::types::{
    AuthenticationOutcome, RegistrationMode, RegistrationOutcome, RegistrationStartRequest,
    UserProfile,
};
use crate::ceremony::CeremonySessionManager;
use crate::config::RpConfig;
use crate::gateway::{RelyingPartyGateway, WebAuthnGateway};
use crate::store::{CredentialId, CredentialInfo, CredentialStore, StoreError, UserHandle};

/// Façade over the credential store, the ceremony session manager and the RP gateway.
///
/// Every ceremony is keyed by the caller's session id, which is opaque here. Management
/// calls take the username of an already authenticated caller.
#[derive(Clone)]
pub struct CeremonyOrchestrator {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<CeremonySessionManager>,
    gateway: Arc<dyn RelyingPartyGateway>,
}

impl CeremonyOrchestrator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: Arc<CeremonySessionManager>,
        gateway: Arc<dyn RelyingPartyGateway>,
    ) -> Self {
        Self {
            store,
            sessions,
            gateway,
        }
    }

    /// Wires the WebAuthn gateway to `store` with a fresh session manager.
    pub fn with_webauthn(config: RpConfig, store: Arc<dyn CredentialStore>) -> Self {
        let gateway = Arc::new(WebAuthnGateway::new(config, store.clone()));
        Self::new(store, Arc::new(CeremonySessionManager::new()), gateway)
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<CeremonySessionManager> {
        &self.sessions
    }

    pub async fn start_registration(
        &self,
        session_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<Value, CoordinationError> {
        self.start_registration_for(session_id, username, display_name, false)
            .await
    }

    async fn start_registration_for(
        &self,
        session_id: &str,
        username: &str,
        display_name: &str,
        new_account: bool,
    ) -> Result<Value, CoordinationError> {
        let username = username.trim();
        let display_name = display_name.trim();
        if username.is_empty() {
            return Err(CoordinationError::Validation("Username is required".to_string()).log());
        }
        if display_name.is_empty() {
            return Err(
                CoordinationError::Validation("Display name is required".to_string()).log(),
            );
        }

        let (user, created) = self
            .store
            .get_or_create_user(username, display_name)
            .await?;
        tracing::debug!(username = %user.username, created, "Starting registration");

        let challenge = self.gateway.create_registration_challenge(&user).await?;
        if new_account {
            self.sessions
                .begin_account_registration(session_id, &user.username, challenge.state);
        } else {
            self.sessions
                .begin_registration(session_id, &user.username, challenge.state);
        }

        Ok(challenge.payload)
    }

    /// Starts registration on behalf of an HTTP caller, honouring the requested mode.
    ///
    /// `AddToUser` needs a signed-in caller and always registers for that caller.
    /// `CreateUser` refuses a username that already has passkeys, both here and again
    /// when the ceremony finishes.
    pub async fn start_registration_with_mode(
        &self,
        session_id: &str,
        signed_in_username: Option<&str>,
        request: RegistrationStartRequest,
    ) -> Result<Value, CoordinationError> {
        match request.mode {
            RegistrationMode::AddToUser => {
                let Some(username) = signed_in_username else {
                    return Err(CoordinationError::Unauthorized.log());
                };
                let display_name = match self.store.get_user(username).await {
                    Ok(user) => user.display_name,
                    Err(_) if !request.display_name.trim().is_empty() => request.display_name,
                    Err(_) => username.to_string(),
                };
                self.start_registration(session_id, username, &display_name)
                    .await
            }
            RegistrationMode::CreateUser => {
                let username = request.username.trim();
                if let Ok(handle) = self.store.find_user_handle(username).await {
                    if self.store.count_credentials(&handle).await? > 0 {
                        return Err(CoordinationError::Conflict(format!(
                            "Username {username} is already registered"
                        ))
                        .log());
                    }
                }
                self.start_registration_for(session_id, username, &request.display_name, true)
                    .await
            }
        }
    }

    pub async fn finish_registration(
        &self,
        session_id: &str,
        client_response: &Value,
    ) -> Result<RegistrationOutcome, CoordinationError> {
        let pending = self.sessions.take_registration(session_id)?;

        let verified = self
            .gateway
            .verify_registration(&pending.state, client_response)
            .await?;

        let username = pending.subject_username.ok_or_else(|| {
            CoordinationError::Internal("Registration ceremony without a user".to_string()).log()
        })?;
        let user_handle = self.store.find_user_handle(&username).await.map_err(|e| {
            CoordinationError::Internal(format!("Registered user vanished: {e}")).log()
        })?;

        let credential = if pending.new_account {
            self.store
                .add_first_credential(
                    &user_handle,
                    verified.credential_id,
                    verified.public_key,
                    verified.signature_counter,
                )
                .await?
        } else {
            self.store
                .add_credential(
                    &user_handle,
                    verified.credential_id,
                    verified.public_key,
                    verified.signature_counter,
                )
                .await?
        };

        tracing::info!(
            username = %username,
            credential_id = %credential.credential_id,
            "Passkey registered"
        );

        Ok(RegistrationOutcome {
            username,
            credential: credential.info(),
        })
    }

    /// A blank username starts a discoverable (usernameless) ceremony.
    pub async fn start_authentication(
        &self,
        session_id: &str,
        username: Option<&str>,
    ) -> Result<Value, CoordinationError> {
        let username = username.map(str::trim).filter(|u| !u.is_empty());

        let challenge = self.gateway.create_assertion_challenge(username).await?;
        self.sessions
            .begin_assertion(session_id, challenge.state, username);

        Ok(challenge.payload)
    }

    /// Every failure is reported as [`CoordinationError::AuthenticationFailed`]; the cause
    /// is only logged. Nothing is mutated unless verification succeeds.
    pub async fn finish_authentication(
        &self,
        session_id: &str,
        client_response: &Value,
    ) -> Result<AuthenticationOutcome, CoordinationError> {
        let pending = self
            .sessions
            .take_assertion(session_id)
            .map_err(authentication_failed)?;

        let verified = self
            .gateway
            .verify_assertion(&pending.state, client_response)
            .await
            .map_err(authentication_failed)?;

        let username = self
            .store
            .find_username(&verified.user_handle)
            .await
            .map_err(authentication_failed)?;

        if let Some(expected) = pending.subject_username.as_deref() {
            if expected != username {
                return Err(authentication_failed(format!(
                    "Assertion for {username} answered a challenge issued to {expected}"
                )));
            }
        }

        let counter = self
            .store
            .update_signature_counter(&verified.credential_id, verified.new_counter, Utc::now())
            .await
            .map_err(authentication_failed)?;

        tracing::info!(
            username = %username,
            credential_id = %verified.credential_id,
            counter_status = ?counter.status,
            "Authentication succeeded"
        );

        Ok(AuthenticationOutcome {
            username,
            user_handle: verified.user_handle,
            credential_id: verified.credential_id,
            counter,
        })
    }

    pub async fn list_passkeys(
        &self,
        username: &str,
    ) -> Result<Vec<CredentialInfo>, CoordinationError> {
        let handle = self.resolve_user(username).await?;
        Ok(self.store.list_credentials(&handle).await?)
    }

    pub async fn rename_passkey(
        &self,
        username: &str,
        credential_id: &str,
        new_name: &str,
    ) -> Result<(), CoordinationError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(
                CoordinationError::Validation("Passkey name cannot be empty".to_string()).log(),
            );
        }

        let handle = self.resolve_user(username).await?;
        self.store
            .rename_credential(&handle, &CredentialId::from(credential_id), new_name)
            .await?;
        tracing::info!(username = %username, credential_id = %credential_id, "Passkey renamed");
        Ok(())
    }

    pub async fn delete_passkey(
        &self,
        username: &str,
        credential_id: &str,
    ) -> Result<(), CoordinationError> {
        let handle = self.resolve_user(username).await?;
        self.store
            .delete_credential(&handle, &CredentialId::from(credential_id))
            .await?;
        Ok(())
    }

    pub async fn user_profile(&self, username: &str) -> Result<UserProfile, CoordinationError> {
        let user = self.store.get_user(username).await?;
        let passkey_count = self.store.count_credentials(&user.user_handle).await?;
        Ok(UserProfile {
            username: user.username,
            display_name: user.display_name,
            created_at: user.created_at,
            passkey_count,
        })
    }

    pub async fn passkey_count(&self, username: &str) -> Result<usize, CoordinationError> {
        let handle = self.resolve_user(username).await?;
        Ok(self.store.count_credentials(&handle).await?)
    }

    /// Drops the pending ceremony of a session that ended.
    pub fn discard_session(&self, session_id: &str) -> bool {
        self.sessions.discard(session_id)
    }

    async fn resolve_user(&self, username: &str) -> Result<UserHandle, CoordinationError> {
        match self.store.find_user_handle(username).await {
            Ok(handle) => Ok(handle),
            Err(StoreError::UserNotFound(_)) => {
                Err(CoordinationError::not_found("User", username).log())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn authentication_failed(reason: impl Display) -> CoordinationError {
    tracing::warn!(reason = %reason, "Authentication failed");
    CoordinationError::AuthenticationFailed
}
