use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::StatusCode;
use serde_json::{Value, json};

use passkey_rp::{CoordinationError, CredentialStore, UserProfile};

use crate::error::{ErrorResponse, IntoResponseError};
use crate::session::{AuthUser, SessionCookie, not_authenticated, session_cookie_headers};
use crate::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/auth-status", get(auth_status))
        .route("/logout", post(logout))
}

/// A session whose user disappeared from the store is ended.
pub(crate) async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, ErrorResponse> {
    match state.orchestrator().user_profile(&user.username).await {
        Err(CoordinationError::ResourceNotFound { .. }) => {
            tracing::error!(username = %user.username, "Authenticated user not found");
            state.end_session(&user.session_id);
            Err(not_authenticated())
        }
        result => result.map(Json).into_response_error(),
    }
}

pub(crate) async fn auth_status(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> Response {
    if let Some(user) = user {
        if state.orchestrator().store().user_exists(&user.username).await {
            return Json(json!({ "authenticated": true, "username": user.username }))
                .into_response();
        }
        state.end_session(&user.session_id);
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "authenticated": false, "error": "Not authenticated" })),
    )
        .into_response()
}

/// Ends the caller session, dropping any pending ceremony, and expires the cookie.
pub(crate) async fn logout(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
) -> Result<Response, ErrorResponse> {
    if let Some(session_id) = session_id {
        state.end_session(&session_id);
        tracing::info!("Caller session logged out");
    }
    let headers = session_cookie_headers("", 0).into_response_error()?;
    let body: Json<Value> = Json(json!({ "success": true, "message": "Logged out successfully" }));
    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{authenticated, caller, state_with_mock};
    use axum::body::to_bytes;
    use http::header::SET_COOKIE;
    use passkey_rp::CeremonyKind;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_profile_of_signed_in_user() {
        let state = state_with_mock();
        state
            .orchestrator()
            .start_registration("setup", "alice", "Alice A")
            .await
            .unwrap();
        let user = authenticated(&state, "alice");

        let Json(profile) = profile(State(state.clone()), user)
            .await
            .unwrap_or_else(|(_, Json(e))| panic!("profile failed: {e}"));
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.display_name, "Alice A");
        assert_eq!(profile.passkey_count, 0);
    }

    #[tokio::test]
    async fn test_profile_of_vanished_user_ends_session() {
        let state = state_with_mock();
        let user = authenticated(&state, "ghost");

        let Err((status, _)) = profile(State(state.clone()), user).await else {
            panic!("expected unauthorized");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_auth_status() {
        let state = state_with_mock();
        state
            .orchestrator()
            .start_registration("setup", "alice", "Alice")
            .await
            .unwrap();

        let response = auth_status(State(state.clone()), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["authenticated"], false);

        let user = authenticated(&state, "alice");
        let response = auth_status(State(state.clone()), Some(user)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["username"], "alice");
    }

    #[tokio::test]
    async fn test_logout_discards_pending_ceremony() {
        // Given a caller with a pending authentication ceremony
        let state = state_with_mock();
        let session = caller(&state);
        state
            .orchestrator()
            .start_authentication(&session.id, None)
            .await
            .unwrap();
        assert_eq!(
            state.orchestrator().sessions().pending_kind(&session.id),
            Some(CeremonyKind::Authentication)
        );

        // When it logs out
        let response = logout(State(state.clone()), SessionCookie(Some(session.id.clone())))
            .await
            .unwrap_or_else(|(_, Json(e))| panic!("logout failed: {e}"));

        // Then the session and its ceremony are gone and the cookie is expired
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert_eq!(state.orchestrator().sessions().pending_kind(&session.id), None);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_purge_discards_ceremonies_of_expired_sessions() {
        let state = AppState::with_session_ttl(state_with_mock().orchestrator().clone(), 0);
        let session = caller(&state);
        state
            .orchestrator()
            .start_authentication(&session.id, None)
            .await
            .unwrap();

        assert_eq!(state.purge_expired_sessions(), 1);
        assert_eq!(state.orchestrator().sessions().pending_kind(&session.id), None);
    }
}
