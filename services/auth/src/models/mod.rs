//! Authentication service models

pub mod credential;
pub mod role;
pub mod session;
pub mod user;

// Re-export for convenience
pub use credential::{CredentialStatus, EncryptedCredential, NewCredential, Provider};
pub use role::Role;
pub use session::{ActiveSession, DeviceInfo, NewSession, PermanentSession, SessionSummary};
pub use user::{LoginCredentials, NewUser, Principal, User};
