//! Global application error types and handlers.
//!
//! This module defines custom error types that are used across the entire
//! backend application and provides mechanisms for consistent error handling
//! and response formatting.

use thiserror::Error;

/// Reasons a presented token is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    Invalid,
    Expired,
    Revoked,
}

/// Generic service error that can be used across all entities
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("{message}")]
    AlreadyExists { message: String },

    #[error("Authentication required: {message}")]
    Unauthenticated { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("{message}")]
    Token {
        kind: TokenErrorKind,
        message: String,
    },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("External service error: {message}")]
    ExternalService { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::Token {
            kind: TokenErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub fn expired_token(message: impl Into<String>) -> Self {
        Self::Token {
            kind: TokenErrorKind::Expired,
            message: message.into(),
        }
    }

    pub fn revoked_token(message: impl Into<String>) -> Self {
        Self::Token {
            kind: TokenErrorKind::Revoked,
            message: message.into(),
        }
    }

    pub fn external_service(message: impl Into<String>) -> Self {
        Self::ExternalService {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Flattens `validator` errors into a single "field: message" list.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        messages.sort();

        Self::validation(messages.join(", "))
    }
}

/// The `table.column` a failed UNIQUE constraint names, when `error` wraps one.
pub fn unique_violation(error: &anyhow::Error) -> Option<String> {
    match error.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => db
            .message()
            .rsplit(": ")
            .next()
            .map(|target| target.trim().to_string()),
        _ => None,
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database {
            source: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Too short"))]
        name: String,
    }

    #[test]
    fn test_validation_errors_are_flattened() {
        let errors = Sample {
            name: "ab".to_string(),
        }
        .validate()
        .unwrap_err();

        let error = ServiceError::from_validation_errors(errors);
        assert_eq!(error.to_string(), "Validation error: name: Too short");
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ServiceError::not_found("Movie", 42).to_string(),
            "Movie not found: 42"
        );
        assert_eq!(
            ServiceError::already_exists("Email already exists").to_string(),
            "Email already exists"
        );
        assert_eq!(
            ServiceError::revoked_token("Token has been revoked").to_string(),
            "Token has been revoked"
        );
    }
}
