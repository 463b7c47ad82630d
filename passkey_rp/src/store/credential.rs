use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::errors::StoreError;
use super::types::{CounterStatus, CounterUpdate, Credential, CredentialId, UserHandle};
use crate::config::CounterPolicy;

/// Per-user bookkeeping: owned ids in registration order and the last issued ordinal.
#[derive(Debug, Default)]
struct OwnerIndex {
    ids: Vec<CredentialId>,
    issued: u32,
}

/// Credential records keyed by credential id, plus a per-owner index.
///
/// Operations that touch both maps always lock the owner index first and the record
/// second, so adding and deleting for one user are serialized against each other.
pub(crate) struct CredentialTable {
    records: DashMap<CredentialId, Credential>,
    owners: DashMap<UserHandle, OwnerIndex>,
}

impl CredentialTable {
    pub(crate) fn new() -> Self {
        Self {
            records: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    pub(crate) fn register_owner(&self, owner: &UserHandle) {
        self.owners.entry(owner.clone()).or_default();
    }

    pub(crate) fn insert(
        &self,
        owner: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError> {
        self.insert_checked(owner, credential_id, public_key, initial_counter, false)
    }

    /// Inserts only while `owner` has no credential, under the same owner lock.
    pub(crate) fn insert_first(
        &self,
        owner: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
    ) -> Result<Credential, StoreError> {
        self.insert_checked(owner, credential_id, public_key, initial_counter, true)
    }

    fn insert_checked(
        &self,
        owner: &UserHandle,
        credential_id: CredentialId,
        public_key: Vec<u8>,
        initial_counter: u32,
        first_only: bool,
    ) -> Result<Credential, StoreError> {
        let mut index = self
            .owners
            .get_mut(owner)
            .ok_or_else(|| StoreError::UserNotFound(owner.to_string()))?;

        if first_only && !index.ids.is_empty() {
            return Err(StoreError::UserAlreadyRegistered(owner.to_string()));
        }

        match self.records.entry(credential_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateCredential(credential_id.to_string())),
            Entry::Vacant(slot) => {
                let ordinal = index.issued + 1;
                let now = Utc::now();
                let credential = Credential {
                    credential_id: credential_id.clone(),
                    owner: owner.clone(),
                    public_key,
                    signature_counter: initial_counter,
                    friendly_name: format!("Passkey {ordinal}"),
                    created_at: now,
                    last_used_at: now,
                };
                slot.insert(credential.clone());
                index.issued = ordinal;
                index.ids.push(credential_id);
                Ok(credential)
            }
        }
    }

    pub(crate) fn list(&self, owner: &UserHandle) -> Vec<Credential> {
        let ids = self.ids(owner);
        ids.iter()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .collect()
    }

    pub(crate) fn ids(&self, owner: &UserHandle) -> Vec<CredentialId> {
        self.owners
            .get(owner)
            .map(|index| index.ids.clone())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, owner: &UserHandle) -> usize {
        self.owners
            .get(owner)
            .map(|index| index.ids.len())
            .unwrap_or(0)
    }

    pub(crate) fn get(&self, credential_id: &CredentialId) -> Option<Credential> {
        self.records.get(credential_id).map(|r| r.clone())
    }

    pub(crate) fn get_owned(
        &self,
        credential_id: &CredentialId,
        owner: &UserHandle,
    ) -> Option<Credential> {
        self.records
            .get(credential_id)
            .filter(|r| &r.owner == owner)
            .map(|r| r.clone())
    }

    pub(crate) fn update_counter(
        &self,
        credential_id: &CredentialId,
        new_counter: u32,
        used_at: DateTime<Utc>,
        policy: CounterPolicy,
    ) -> Result<CounterUpdate, StoreError> {
        let mut record = self
            .records
            .get_mut(credential_id)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))?;

        let previous = record.signature_counter;
        let status = CounterStatus::evaluate(previous, new_counter);

        if status == CounterStatus::Regressed {
            tracing::warn!(
                credential_id = %credential_id,
                stored = previous,
                received = new_counter,
                "Signature counter did not increase, authenticator may be cloned"
            );
            if policy == CounterPolicy::Reject {
                return Err(StoreError::CounterRegression {
                    stored: previous,
                    received: new_counter,
                });
            }
        }

        record.signature_counter = new_counter;
        record.last_used_at = used_at;

        Ok(CounterUpdate {
            previous,
            current: new_counter,
            status,
        })
    }

    pub(crate) fn rename(
        &self,
        owner: &UserHandle,
        credential_id: &CredentialId,
        new_name: &str,
    ) -> Result<(), StoreError> {
        match self.records.get_mut(credential_id) {
            Some(mut record) if &record.owner == owner => {
                record.friendly_name = new_name.to_string();
                Ok(())
            }
            _ => Err(StoreError::CredentialNotFound(credential_id.to_string())),
        }
    }

    pub(crate) fn remove(
        &self,
        owner: &UserHandle,
        credential_id: &CredentialId,
    ) -> Result<Credential, StoreError> {
        let mut index = self
            .owners
            .get_mut(owner)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))?;

        let position = index
            .ids
            .iter()
            .position(|id| id == credential_id)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))?;

        if index.ids.len() <= 1 {
            return Err(StoreError::LastCredential);
        }

        let (_, removed) = self
            .records
            .remove(credential_id)
            .ok_or_else(|| StoreError::CredentialNotFound(credential_id.to_string()))?;
        index.ids.remove(position);
        Ok(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
