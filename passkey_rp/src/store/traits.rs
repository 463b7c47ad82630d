use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreError;
use super::types::{CounterUpdate, Credential, CredentialId, CredentialInfo, User, UserHandle};

/// Persistent state of the relying party: users and their passkeys.
///
/// Every operation is atomic with respect to concurrent callers. Implementations
/// enforce the username/handle bijection, global credential id uniqueness,
/// protection of a user's last credential, and friendly-name ordinals that are
/// never reused for the same user.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn find_user_handle(&self, username: &str) -> Result<UserHandle, StoreError>;

    async fn find_username(&self, user_handle: &UserHandle) -> Result<String, StoreError>;

    async fn get_user(&self, username: &str) -> Result<User, StoreError>;

    async fn user_exists(&self, username: &str) -> bool {
        self.get_user(username).await.is_ok()
    }

    /// Returns the user and whether it was created by this call.
    ///
    /// An existing user keeps its handle and display name.
    async fn get_or_create_user(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<(User, bool), StoreError>;

    async fn add_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError>;

    /// Like [`add_credential`](Self::add_credential), but fails with
    /// [`StoreError::UserAlreadyRegistered`] if the user already owns a credential.
    /// The check and the insert are one atomic step.
    async fn add_first_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError>;

    /// Credentials of the user in registration order, without key material.
    async fn list_credentials(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Vec<CredentialInfo>, StoreError>;

    async fn credential_ids_for_user(
        &self,
        user_handle: &UserHandle,
    ) -> Result<Vec<CredentialId>, StoreError>;

    async fn count_credentials(&self, user_handle: &UserHandle) -> Result<usize, StoreError>;

    async fn lookup_credential(&self, credential_id: &CredentialId)
    -> Result<Credential, StoreError>;

    /// Like [`lookup_credential`](Self::lookup_credential), but a credential owned by
    /// someone else is reported as not found.
    async fn lookup_credential_for_owner(
        &self,
        credential_id: &CredentialId,
        expected_owner: &UserHandle,
    ) -> Result<Credential, StoreError>;

    /// Records a successful assertion: stores the reported counter and usage time.
    async fn update_signature_counter(
        &self,
        credential_id: &CredentialId,
        new_counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError>;

    async fn rename_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: &CredentialId,
        new_name: &str,
    ) -> Result<(), StoreError>;

    async fn delete_credential(
        &self,
        user_handle: &UserHandle,
        credential_id: &CredentialId,
    ) -> Result<(), StoreError>;
}
