use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::credential::CredentialTable;
use super::errors::StoreError;
use super::identity::IdentityTable;
use super::traits::CredentialStore;
use super::types::{CounterUpdate, Credential, CredentialId, CredentialInfo, User, UserHandle};
use crate::config::CounterPolicy;

/// Process-local credential store backed by concurrent hash maps.
pub struct InMemoryCredentialStore {
    identities: IdentityTable,
    credentials: CredentialTable,
    counter_policy: CounterPolicy,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_counter_policy(CounterPolicy::default())
    }

    pub fn with_counter_policy(counter_policy: CounterPolicy) -> Self {
        Self {
            identities: IdentityTable::new(),
            credentials: CredentialTable::new(),
            counter_policy,
        }
    }

    pub fn counter_policy(&self) -> CounterPolicy {
        self.counter_policy
    }

    pub fn user_count(&self) -> usize {
        self.identities.len()
    }

    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_handle(&self, username: &str) -> Result<UserHandle, StoreError> {
        self.identities
            .find_user_handle(username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    async fn find_username(&self, user_handle: &UserHandle) -> Result<String, StoreError> {
        self.identities
            .find_username(user_handle)
            .ok_or_else(|| StoreError::UserNotFound(user_handle.to_string()))
    }

    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        self.identities
            .get(username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    async fn get_or_create_user(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<(User, bool), StoreError> {
        let (user, created) = self.identities.get_or_create(
            username,
            display_name,
            UserHandle::generate,
            |handle| self.credentials.register_owner(handle),
        )?;
        if created {
            tracing::info!(username = %username, "Created new user");
        }
        Ok((user, created))
    }

    async fn add_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError> {
        let credential =
            self.credentials
                .insert(user_handle, credential_id, public_key, initial_counter)?;
        tracing::debug!(
            credential_id = %credential.credential_id,
            name = %credential.friendly_name,
            "Stored credential"
        );
        Ok(credential)
    }

    async fn add_first_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError> {
        let credential = self.credentials.insert_first(
            user_handle,
            credential_id,
            public_key,
            initial_counter,
        )?;
        tracing::debug!(
            credential_id = %credential.credential_id,
            "Stored first credential of a new account"
        );
        Ok(credential)
    }

    async fn list_credentials(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Vec<CredentialInfo>, StoreError> {
        Ok(self
            .credentials
            .list(user_handle)
            .iter()
            .map(Credential::info)
            .collect())
    }

    async fn credential_ids_for_user(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Vec<CredentialId>, StoreError> {
        Ok(self.credentials.ids(user_handle))
    }

    async fn count_credentials(&self, user_handle: &UserHandle) -> Result<usize, StoreError> {
        Ok(self.credentials.count(user_handle))
    }

    async fn lookup_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Credential, StoreError> {
        self.credentials
            .get(credential_id)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))
    }

    async fn lookup_credential_for_owner(
        &self,
        credential_id: &CredentialId,
        expected_owner: &UserHandle,
    ) -> Result<Credential, StoreError> {
        self.credentials
            .get_owned(credential_id, expected_owner)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))
    }

    async fn update_signature_counter(
        &self,
        credential_id: &CredentialId,
        new_counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError> {
        self.credentials
            .update_counter(credential_id, new_counter, used_at, self.counter_policy)
    }

    async fn rename_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: &CredentialId,
        new_name: &str,
    ) -> Result<(), StoreError> {
        self.credentials.rename(user_handle, credential_id, new_name)
    }

    async fn delete_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: &CredentialId,
    ) -> Result<(), StoreError> {
        let removed = self.credentials.remove(user_handle, credential_id)?;
        tracing::info!(credential_id = %removed.credential_id, "Deleted credential");
        Ok(())
    }
}
