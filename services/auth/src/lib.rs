//! Credential core of the Git Nacht documentation service
//!
//! Issues and validates bearer credentials (signed ephemeral tokens and
//! server-tracked permanent sessions) and keeps third-party OAuth tokens
//! encrypted at rest. [`routes::create_router`] exposes it over HTTP.

pub mod config;
pub mod error;
pub mod gateway;
pub mod github;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod token;
pub mod validation;
pub mod vault;

pub use error::{AuthError, AuthResult};
pub use gateway::{AuthContext, AuthGateway, ClientInfo, IssuedCredential, SessionKind};
pub use routes::{AppState, create_router};
pub use session::SessionStore;
pub use token::TokenCodec;
pub use vault::{CredentialVault, TokenCipher};
