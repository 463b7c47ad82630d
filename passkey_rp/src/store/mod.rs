mod credential;
mod errors;
mod identity;
mod memory;
mod traits;
mod types;

pub use errors::StoreError;
pub use memory::InMemoryCredentialStore;
pub use traits::CredentialStore;
pub use types::{
    CounterStatus, CounterUpdate, Credential, CredentialId, CredentialInfo, User, UserHandle,
};
