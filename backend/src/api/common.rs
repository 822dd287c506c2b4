//! Error handling utilities for GraphQL responses.
//!
//! Converts service-layer errors into GraphQL errors carrying a
//! machine-readable `code` extension, and gives resolvers access to the
//! HTTP side of the request (incoming headers, outgoing cookies).
//!
//! # Error codes
//! - `VALIDATION_ERROR`: malformed input, weak passwords, invalid operations
//! - `ALREADY_EXISTS`: duplicate email, username or slug
//! - `NOT_FOUND`: unknown movie, category or user
//! - `INVALID_TOKEN`, `EXPIRED_TOKEN`, `REVOKED_TOKEN`
//! - `UNAUTHENTICATED`, `PERMISSION_DENIED`
//! - `EXTERNAL_SERVICE_ERROR`: email delivery failures
//! - `INTERNAL_ERROR`: database and other server faults; details are logged only

use crate::errors::{ServiceError, TokenErrorKind};
use crate::state::AppState;
use async_graphql::{Context, ErrorExtensions};
use axum::http::{HeaderMap, header::SET_COOKIE};

/// Maps a `ServiceError` to the GraphQL error returned to clients.
pub fn service_error_to_graphql(error: ServiceError) -> async_graphql::Error {
    let (code, message) = match error {
        ServiceError::Validation { message } => ("VALIDATION_ERROR", message),
        ServiceError::InvalidOperation { message } => ("VALIDATION_ERROR", message),
        ServiceError::NotFound { entity, identifier } => {
            ("NOT_FOUND", format!("{entity} not found: {identifier}"))
        }
        ServiceError::AlreadyExists { message } => ("ALREADY_EXISTS", message),
        ServiceError::Unauthenticated { message } => ("UNAUTHENTICATED", message),
        ServiceError::PermissionDenied { message } => ("PERMISSION_DENIED", message),
        ServiceError::Token { kind, message } => {
            let code = match kind {
                TokenErrorKind::Invalid => "INVALID_TOKEN",
                TokenErrorKind::Expired => "EXPIRED_TOKEN",
                TokenErrorKind::Revoked => "REVOKED_TOKEN",
            };
            (code, message)
        }
        ServiceError::ExternalService { message } => {
            tracing::error!("External service error: {}", message);
            ("EXTERNAL_SERVICE_ERROR", message)
        }
        ServiceError::Database { source } => {
            tracing::error!("Database error: {}", source);
            ("INTERNAL_ERROR", "Internal server error".to_string())
        }
        ServiceError::InternalError { message } => {
            tracing::error!("Internal error: {}", message);
            ("INTERNAL_ERROR", "Internal server error".to_string())
        }
    };

    async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
}

/// Shared state registered on the schema.
pub fn app_state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppState> {
    ctx.data::<AppState>()
}

/// Headers of the HTTP request carrying this GraphQL operation.
pub fn request_headers<'a>(ctx: &Context<'a>) -> &'a HeaderMap {
    static EMPTY: std::sync::OnceLock<HeaderMap> = std::sync::OnceLock::new();
    ctx.data_opt::<HeaderMap>()
        .unwrap_or_else(|| EMPTY.get_or_init(HeaderMap::new))
}

/// Appends `Set-Cookie` headers to the HTTP response.
pub fn set_cookies(ctx: &Context<'_>, cookies: Vec<String>) {
    for cookie in cookies {
        ctx.append_http_header(SET_COOKIE, cookie);
    }
}
