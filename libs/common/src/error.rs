//! Custom error types for the common library
//!
//! Storage-layer failures are surfaced through [`DatabaseError`] so that the
//! services can treat them as infrastructure errors without depending on
//! sqlx error internals.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A write collided with a uniqueness constraint
    #[error("Database conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped onto its domain type
    #[error("Database decode error: {0}")]
    Decode(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
