use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passkey_rp::{CeremonyOrchestrator, InMemoryCredentialStore, RpConfig};
use passkey_rp_axum::{AppState, AuthUser, RP_ROUTE_PREFIX, passkey_rp_router};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

async fn index(user: Option<AuthUser>) -> Json<Value> {
    match user {
        Some(u) => Json(json!({ "message": format!("Hello, {}!", u.username) })),
        None => Json(json!({ "message": "Hello, anonymous user" })),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,passkey_rp=debug,passkey_rp_axum=debug,tower_http=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RpConfig::from_env()?;
    tracing::info!(
        rp_id = %config.rp_id,
        origin = config.primary_origin().unwrap_or_default(),
        "Relying party configured"
    );

    let store = Arc::new(InMemoryCredentialStore::with_counter_policy(
        config.counter_policy,
    ));
    let orchestrator = CeremonyOrchestrator::with_webauthn(config, store);
    let state = AppState::new(orchestrator);

    let purge_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            purge_state.purge_expired_sessions();
        }
    });

    let app = Router::new()
        .route("/", get(index))
        .with_state(state.clone())
        .nest(RP_ROUTE_PREFIX.as_str(), passkey_rp_router(state));

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
