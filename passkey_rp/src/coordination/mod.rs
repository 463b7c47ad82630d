mod errors;
mod orchestrator;
mod types;

pub use errors::CoordinationError;
pub use orchestrator::CeremonyOrchestrator;
pub use types::{
    AuthenticationOutcome, RegistrationMode, RegistrationOutcome, RegistrationStartRequest,
    UserProfile,
};
