use chrono::Utc;
use dashmap::DashMap;

use super::errors::CeremonyError;
use super::types::{CeremonyKind, OpaqueState, PendingCeremony};

/// Single-use store of in-flight ceremonies, one slot per caller session.
///
/// Beginning a ceremony replaces whatever the session had pending. Taking a
/// ceremony removes it in the same step, so a challenge can be answered once.
#[derive(Default)]
pub struct CeremonySessionManager {
    pending: DashMap<String, PendingCeremony>,
}

impl CeremonySessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_registration(&self, session_id: &str, username: &str, state: OpaqueState) {
        self.begin_registration_for(session_id, username, state, false);
    }

    /// Registration whose finish must be the first credential of `username`.
    pub fn begin_account_registration(&self, session_id: &str, username: &str, state: OpaqueState) {
        self.begin_registration_for(session_id, username, state, true);
    }

    fn begin_registration_for(
        &self,
        session_id: &str,
        username: &str,
        state: OpaqueState,
        new_account: bool,
    ) {
        self.begin(
            session_id,
            PendingCeremony {
                kind: CeremonyKind::Registration,
                subject_username: Some(username.to_string()),
                new_account,
                state,
                created_at: Utc::now(),
            },
        );
    }

    pub fn begin_assertion(&self, session_id: &str, state: OpaqueState, username: Option<&str>) {
        self.begin(
            session_id,
            PendingCeremony {
                kind: CeremonyKind::Authentication,
                subject_username: username.map(str::to_string),
                new_account: false,
                state,
                created_at: Utc::now(),
            },
        );
    }

    pub fn take_registration(&self, session_id: &str) -> Result<PendingCeremony, CeremonyError> {
        self.take(session_id, CeremonyKind::Registration)
    }

    pub fn take_assertion(&self, session_id: &str) -> Result<PendingCeremony, CeremonyError> {
        self.take(session_id, CeremonyKind::Authentication)
    }

    /// Drops whatever the session has pending. Returns whether anything was dropped.
    pub fn discard(&self, session_id: &str) -> bool {
        let removed = self.pending.remove(session_id).is_some();
        if removed {
            tracing::debug!("Discarded pending ceremony");
        }
        removed
    }

    pub fn pending_kind(&self, session_id: &str) -> Option<CeremonyKind> {
        self.pending.get(session_id).map(|p| p.kind)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn begin(&self, session_id: &str, ceremony: PendingCeremony) {
        let kind = ceremony.kind;
        if let Some(previous) = self.pending.insert(session_id.to_string(), ceremony) {
            tracing::debug!(
                previous = %previous.kind,
                next = %kind,
                "Replacing pending ceremony"
            );
        }
    }

    // A pending ceremony of the other kind stays in place.
    fn take(&self, session_id: &str, kind: CeremonyKind) -> Result<PendingCeremony, CeremonyError> {
        self.pending
            .remove_if(session_id, |_, pending| pending.kind == kind)
            .map(|(_, pending)| pending)
            .ok_or(CeremonyError::ExpiredOrMissing(kind))
    }
}
