use std::convert::Infallible;

use axum::{
    RequestPartsExt,
    extract::{FromRequestParts, OptionalFromRequestParts},
};
use axum_extra::{TypedHeader, headers};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE, request::Parts};
use passkey_rp::{UtilError, gen_random_string};

use crate::config::SESSION_COOKIE_NAME;
use crate::error::{ErrorResponse, IntoResponseError, error_response};
use crate::state::AppState;

const SESSION_ID_LEN: usize = 32;

#[derive(Debug, Clone)]
struct SessionRecord {
    username: Option<String>,
    expires_at: DateTime<Utc>,
}

pub(crate) enum SessionLookup {
    Live(Option<String>),
    Expired,
    Missing,
}

/// In-memory table of caller sessions keyed by the session cookie value.
///
/// A session is anonymous until an authentication ceremony succeeds, after which it
/// carries the username. Expired entries are dropped on lookup or by [`purge_expired`].
///
/// [`purge_expired`]: SessionStore::purge_expired
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionRecord>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(
                i64::try_from(ttl_secs)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            ),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub(crate) fn create(
        &self,
        username: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, UtilError> {
        let id = gen_random_string(SESSION_ID_LEN)?;
        self.sessions.insert(
            id.clone(),
            SessionRecord {
                username,
                expires_at: now + self.ttl,
            },
        );
        Ok(id)
    }

    pub(crate) fn lookup(&self, session_id: &str, now: DateTime<Utc>) -> SessionLookup {
        if self
            .sessions
            .remove_if(session_id, |_, record| record.expires_at <= now)
            .is_some()
        {
            return SessionLookup::Expired;
        }
        match self.sessions.get(session_id) {
            Some(record) => SessionLookup::Live(record.username.clone()),
            None => SessionLookup::Missing,
        }
    }

    pub(crate) fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Drops every session expired at `now` and returns their ids.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.key().clone())
            .collect();
        expired
            .into_iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id, |_, record| record.expires_at <= now)
                    .is_some()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

pub(crate) fn session_cookie_headers(
    session_id: &str,
    max_age: i64,
) -> Result<HeaderMap, http::Error> {
    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Lax",
        SESSION_COOKIE_NAME.as_str(),
        session_id,
        max_age
    );
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, HeaderValue::from_str(&cookie)?);
    Ok(headers)
}

/// Session id carried by the request cookie, if any
pub(crate) struct SessionCookie(pub(crate) Option<String>);

impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .extract::<TypedHeader<headers::Cookie>>()
            .await
            .ok()
            .and_then(|TypedHeader(cookies)| {
                cookies
                    .get(SESSION_COOKIE_NAME.as_str())
                    .map(str::to_string)
            });
        Ok(SessionCookie(session_id))
    }
}

/// The caller's session, created on first contact.
///
/// Ceremonies are keyed by `id`. When the session is new, `headers` holds the
/// `Set-Cookie` header the handler must return.
#[derive(Debug, Clone)]
pub struct CallerSession {
    pub id: String,
    pub username: Option<String>,
    pub(crate) headers: HeaderMap,
}

impl FromRequestParts<AppState> for CallerSession {
    type Rejection = ErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(SessionCookie(cookie)) = parts.extract::<SessionCookie>().await;
        let now = Utc::now();

        if let Some(id) = cookie {
            match state.sessions().lookup(&id, now) {
                SessionLookup::Live(username) => {
                    return Ok(CallerSession {
                        id,
                        username,
                        headers: HeaderMap::new(),
                    });
                }
                SessionLookup::Expired => {
                    tracing::debug!("Caller session expired");
                    state.orchestrator().discard_session(&id);
                }
                SessionLookup::Missing => {}
            }
        }

        let id = state.sessions().create(None, now).map_err(|e| {
            tracing::error!("Failed to create caller session: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })?;
        let headers =
            session_cookie_headers(&id, state.sessions().ttl_secs()).into_response_error()?;
        tracing::debug!("New caller session");

        Ok(CallerSession {
            id,
            username: None,
            headers,
        })
    }
}

/// Authenticated user, available as an Axum extractor
///
/// Rejects with 401 unless the session cookie names a live session that completed
/// an authentication ceremony.
///
/// # Example
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use passkey_rp_axum::{AppState, AuthUser};
///
/// async fn protected_handler(user: AuthUser) -> String {
///     format!("Hello, {}!", user.username)
/// }
///
/// let app: Router<AppState> = Router::new()
///     .route("/protected", get(protected_handler));
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub session_id: String,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(SessionCookie(cookie)) = parts.extract::<SessionCookie>().await;
        let session_id = cookie.ok_or_else(not_authenticated)?;

        match state.sessions().lookup(&session_id, Utc::now()) {
            SessionLookup::Live(Some(username)) => Ok(AuthUser {
                session_id,
                username,
            }),
            SessionLookup::Live(None) | SessionLookup::Missing => Err(not_authenticated()),
            SessionLookup::Expired => {
                state.orchestrator().discard_session(&session_id);
                Err(not_authenticated())
            }
        }
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        let result: Result<Self, ErrorResponse> =
            <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await;
        Ok(result.ok())
    }
}

pub(crate) fn not_authenticated() -> ErrorResponse {
    error_response(StatusCode::UNAUTHORIZED, "Not authenticated")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let id = store.create(None, now).unwrap();

        assert!(matches!(store.lookup(&id, now), SessionLookup::Live(None)));
        assert!(matches!(store.lookup("other", now), SessionLookup::Missing));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_authenticated_session_carries_username() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let id = store.create(Some("alice".to_string()), now).unwrap();

        match store.lookup(&id, now) {
            SessionLookup::Live(Some(username)) => assert_eq!(username, "alice"),
            _ => panic!("expected a live authenticated session"),
        }
    }

    #[test]
    fn test_expired_session_is_dropped_on_lookup() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let id = store.create(None, now).unwrap();

        let later = now + Duration::seconds(61);
        assert!(matches!(store.lookup(&id, later), SessionLookup::Expired));
        assert!(matches!(store.lookup(&id, later), SessionLookup::Missing));
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(60);
        let now = Utc::now();
        let old = store.create(None, now - Duration::seconds(120)).unwrap();
        let fresh = store.create(None, now).unwrap();

        let purged = store.purge_expired(now);
        assert_eq!(purged, vec![old]);
        assert!(matches!(store.lookup(&fresh, now), SessionLookup::Live(None)));
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new(60);
        let id = store.create(None, Utc::now()).unwrap();
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
    }

    #[test]
    fn test_cookie_attributes() {
        let headers = session_cookie_headers("abc", 3600).unwrap();
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("{}=abc;", SESSION_COOKIE_NAME.as_str())));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }
}
