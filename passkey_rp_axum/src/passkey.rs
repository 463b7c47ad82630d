use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use chrono::Utc;
use http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use passkey_rp::{CredentialInfo, RegistrationStartRequest};

use crate::error::{ErrorResponse, IntoResponseError, error_response};
use crate::session::{AuthUser, CallerSession, session_cookie_headers};
use crate::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .nest("/webauthn/register", router_register())
        .nest("/webauthn/authenticate", router_auth())
        .route("/passkeys", get(list_passkeys))
        .route("/passkeys/{credential_id}", delete(delete_passkey))
        .route("/passkeys/{credential_id}/name", put(rename_passkey))
}

fn router_register() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_registration))
        .route("/finish", post(finish_registration))
}

fn router_auth() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_authentication))
        .route("/finish", post(finish_authentication))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthenticationStartRequest {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenameRequest {
    name: String,
}

pub(crate) async fn start_registration(
    State(state): State<AppState>,
    session: CallerSession,
    Json(request): Json<RegistrationStartRequest>,
) -> Result<(HeaderMap, Json<Value>), ErrorResponse> {
    let payload = state
        .orchestrator()
        .start_registration_with_mode(&session.id, session.username.as_deref(), request)
        .await
        .into_response_error()?;
    Ok((session.headers, Json(payload)))
}

pub(crate) async fn finish_registration(
    State(state): State<AppState>,
    session: CallerSession,
    Json(response): Json<Value>,
) -> Result<(HeaderMap, Json<Value>), ErrorResponse> {
    let outcome = state
        .orchestrator()
        .finish_registration(&session.id, &response)
        .await
        .into_response_error()?;
    Ok((
        session.headers,
        Json(json!({
            "success": true,
            "username": outcome.username,
            "passkey": outcome.credential,
        })),
    ))
}

/// The body may be omitted for a discoverable ceremony.
pub(crate) async fn start_authentication(
    State(state): State<AppState>,
    session: CallerSession,
    request: Option<Json<AuthenticationStartRequest>>,
) -> Result<(HeaderMap, Json<Value>), ErrorResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let payload = state
        .orchestrator()
        .start_authentication(&session.id, request.username.as_deref())
        .await
        .into_response_error()?;
    Ok((session.headers, Json(payload)))
}

/// On success the caller gets a fresh authenticated session.
pub(crate) async fn finish_authentication(
    State(state): State<AppState>,
    session: CallerSession,
    Json(response): Json<Value>,
) -> Result<(HeaderMap, Json<Value>), ErrorResponse> {
    let outcome = state
        .orchestrator()
        .finish_authentication(&session.id, &response)
        .await
        .into_response_error()?;

    state.end_session(&session.id);
    let session_id = state
        .sessions()
        .create(Some(outcome.username.clone()), Utc::now())
        .map_err(|e| {
            tracing::error!("Failed to create authenticated session: {}", e);
            error_response(
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            )
        })?;
    let headers =
        session_cookie_headers(&session_id, state.sessions().ttl_secs()).into_response_error()?;

    Ok((
        headers,
        Json(json!({ "success": true, "username": outcome.username })),
    ))
}

pub(crate) async fn list_passkeys(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CredentialInfo>>, ErrorResponse> {
    let passkeys = state
        .orchestrator()
        .list_passkeys(&user.username)
        .await
        .into_response_error()?;
    Ok(Json(passkeys))
}

pub(crate) async fn rename_passkey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(credential_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    state
        .orchestrator()
        .rename_passkey(&user.username, &credential_id, &request.name)
        .await
        .into_response_error()?;
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn delete_passkey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(credential_id): Path<String>,
) -> Result<Json<Value>, ErrorResponse> {
    state
        .orchestrator()
        .delete_passkey(&user.username, &credential_id)
        .await
        .into_response_error()?;
    tracing::info!(username = %user.username, credential_id = %credential_id, "Passkey deleted");
    Ok(Json(json!({ "success": true })))
}
