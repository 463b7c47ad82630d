use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::errors::StoreError;
use super::types::{User, UserHandle};
use crate::utils::UtilError;

/// username ⇄ user handle bijection.
///
/// Both directions are sharded maps; creation happens under the username's entry
/// lock, so two callers racing on a new username observe a single handle.
pub(crate) struct IdentityTable {
    by_username: DashMap<String, User>,
    by_handle: DashMap<UserHandle, String>,
}

impl IdentityTable {
    pub(crate) fn new() -> Self {
        Self {
            by_username: DashMap::new(),
            by_handle: DashMap::new(),
        }
    }

    pub(crate) fn find_user_handle(&self, username: &str) -> Option<UserHandle> {
        self.by_username
            .get(username)
            .map(|user| user.user_handle.clone())
    }

    pub(crate) fn find_username(&self, user_handle: &UserHandle) -> Option<String> {
        self.by_handle.get(user_handle).map(|name| name.clone())
    }

    pub(crate) fn get(&self, username: &str) -> Option<User> {
        self.by_username.get(username).map(|user| user.clone())
    }

    /// Returns the existing user, or inserts a new one with a handle produced by `mint`.
    ///
    /// `on_create` runs while the username entry is still locked, before the new user
    /// becomes visible through `find_user_handle`.
    pub(crate) fn get_or_create<M, C>(
        &self,
        username: &str,
        display_name: &str,
        mut mint: M,
        on_create: C,
    ) -> Result<(User, bool), StoreError>
    where
        M: FnMut() -> Result<UserHandle, UtilError>,
        C: FnOnce(&UserHandle),
    {
        match self.by_username.entry(username.to_string()) {
            Entry::Occupied(entry) => Ok((entry.get().clone(), false)),
            Entry::Vacant(entry) => {
                let user_handle = loop {
                    let candidate = mint()?;
                    match self.by_handle.entry(candidate.clone()) {
                        Entry::Occupied(_) => {
                            tracing::warn!("User handle collision, minting another one");
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(username.to_string());
                            break candidate;
                        }
                    }
                };

                on_create(&user_handle);

                let user = User {
                    username: username.to_string(),
                    display_name: display_name.to_string(),
                    user_handle,
                    created_at: Utc::now(),
                };
                entry.insert(user.clone());
                Ok((user, true))
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.by_username.len()
    }
}
