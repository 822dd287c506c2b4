//! Data structures for authentication-related entities.
//!
//! This module defines the issued token pair and the identity of the caller
//! as seen by a single request.

use crate::database::models::{RefreshToken, User};
use crate::utils::jwt::{Claims, IssuedToken};

/// Access token plus stored refresh token issued for a user.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub user: User,
    pub access: IssuedToken,
    pub refresh: RefreshToken,
}

/// Who is calling, resolved once per request from the access token.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub claims: Option<Claims>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { claims: None }
    }

    pub fn authenticated(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }
}
