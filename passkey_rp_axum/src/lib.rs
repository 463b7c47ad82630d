//! passkey-rp-axum - Axum integration for the passkey relying-party core
//!
//! Exposes the registration, authentication and passkey management ceremonies of
//! [`passkey_rp::CeremonyOrchestrator`] as JSON endpoints, with an in-memory cookie
//! session per caller.

mod config;
mod error;
mod passkey;
mod router;
mod session;
mod state;
mod user;

#[cfg(test)]
mod test_utils;

pub use config::{RP_ROUTE_PREFIX, SESSION_COOKIE_NAME, SESSION_TTL};
pub use error::{ErrorResponse, IntoResponseError};
pub use router::{passkey_rp_router, passkey_rp_router_no_trace};
pub use session::{AuthUser, CallerSession, SessionStore};
pub use state::AppState;
