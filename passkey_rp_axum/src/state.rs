use std::sync::Arc;

use chrono::Utc;
use passkey_rp::CeremonyOrchestrator;

use crate::config::SESSION_TTL;
use crate::session::SessionStore;

/// Shared state of the relying-party routes
#[derive(Clone)]
pub struct AppState {
    orchestrator: CeremonyOrchestrator,
    sessions: Arc<SessionStore>,
}

impl AppState {
    /// Caller sessions live for `SESSION_TTL` seconds.
    pub fn new(orchestrator: CeremonyOrchestrator) -> Self {
        Self::with_session_ttl(orchestrator, *SESSION_TTL)
    }

    pub fn with_session_ttl(orchestrator: CeremonyOrchestrator, ttl_secs: u64) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(SessionStore::new(ttl_secs)),
        }
    }

    pub fn orchestrator(&self) -> &CeremonyOrchestrator {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Ends a caller session together with its pending ceremony.
    pub(crate) fn end_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.orchestrator.discard_session(session_id);
    }

    /// Drops expired caller sessions and their pending ceremonies.
    pub fn purge_expired_sessions(&self) -> usize {
        let expired = self.sessions.purge_expired(Utc::now());
        for session_id in &expired {
            self.orchestrator.discard_session(session_id);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Purged expired caller sessions");
        }
        expired.len()
    }
}
