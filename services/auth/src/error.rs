//! Error taxonomy for credential issuance and validation
//!
//! Internal variants keep the precise failure reason for logging. At the HTTP
//! boundary every authentication failure collapses to the same `401` body so
//! that clients cannot tell a bad signature from an unknown session.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::Role;

/// Custom error type for authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("principal lacks required role {required}")]
    ForbiddenRole { required: Role },

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("session not found")]
    SessionNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("credential decryption failed")]
    DecryptionError,

    #[error("encryption backend failure: {0}")]
    EncryptionBackendFailure(String),

    #[error("token lifetime out of range")]
    TokenLifetime,

    #[error("token encoding failed: {0}")]
    TokenEncoding(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl AuthError {
    /// Failures that say something about the presented credential, as opposed
    /// to failures of the machinery checking it
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::BadSignature
                | AuthError::Expired
                | AuthError::Unauthenticated
                | AuthError::SessionNotFound
        )
    }
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            e if e.is_authentication_failure() => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AuthError::ForbiddenRole { .. } => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AuthError::EmailTaken => (StatusCode::CONFLICT, "User already exists".to_string()),
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
