//! The single error type returned across every service boundary.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::User;
use crate::domain::UserId;

/// Domain error carrying an HTTP status, a user-facing message and a cause.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("The field '{field}' is required")]
    ValueRequired { field: &'static str },

    #[error("The field '{field}' exceeds the maximum length of {max} characters")]
    ValueTooLong { field: &'static str, max: usize },

    #[error("Missing or malformed parameter '{0}'")]
    ParameterMissing(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Invalid credentials or session")]
    Unauthorized,

    /// Conflicts: duplicates, last-admin protection, expired tokens.
    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.into())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("The {what} was not found"))
    }

    pub fn denied(what: &str) -> Self {
        Self::PermissionDenied(format!("You are not allowed to modify this {what}"))
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ValueRequired { .. }
            | Self::ValueTooLong { .. }
            | Self::ParameterMissing(_)
            | Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller; internal causes are never exposed.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Fails with `PermissionDenied` unless `caller` is an admin or owns the aggregate.
pub fn ensure_owner(caller: &User, owner: UserId, what: &str) -> Result<(), ServiceError> {
    if caller.is_admin || caller.id == owner {
        Ok(())
    } else {
        Err(ServiceError::denied(what))
    }
}

pub fn ensure_admin(caller: &User) -> Result<(), ServiceError> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "This action requires administrator rights".to_string(),
        ))
    }
}
