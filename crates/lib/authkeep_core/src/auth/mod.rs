//! Authentication and authorization logic.
//!
//! Provides password hashing, slug derivation, JWT management, opaque token
//! generation, boundary validation rules and the `AuthService`.

pub mod jwt;
pub mod password;
pub mod service;
pub mod slug;
pub mod tokens;
pub mod validation;

use std::fmt;

use thiserror::Error;

use crate::mail::MailError;

/// The unique user field a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Email,
    DisplayName,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Email => f.write_str("email"),
            ConflictField::DisplayName => f.write_str("username"),
        }
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate {0}")]
    Conflict(ConflictField),

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reset token expired or unknown")]
    Gone,

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
