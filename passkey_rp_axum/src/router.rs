//! Combined router for the relying-party endpoints

use axum::Router;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;

/// Create a combined router for all relying-party endpoints
///
/// Mount it under `RP_ROUTE_PREFIX`. The endpoints will be available at:
/// - {RP_ROUTE_PREFIX}/webauthn/register/{start,finish}
/// - {RP_ROUTE_PREFIX}/webauthn/authenticate/{start,finish}
/// - {RP_ROUTE_PREFIX}/passkeys[/{id}[/name]]
/// - {RP_ROUTE_PREFIX}/user/{profile,auth-status,logout}
pub fn passkey_rp_router(state: AppState) -> Router {
    passkey_rp_router_no_trace(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Same as [`passkey_rp_router`] without the HTTP tracing middleware.
pub fn passkey_rp_router_no_trace(state: AppState) -> Router {
    Router::new()
        .merge(super::passkey::router())
        .nest("/user", super::user::router())
        .with_state(state)
}
