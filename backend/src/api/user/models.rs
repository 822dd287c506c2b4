//! GraphQL types returned by the identity operations.

use crate::auth::models::TokenPair;
use crate::database::models::{RefreshToken, User};
use crate::utils::jwt::Claims;
use async_graphql::{ID, SimpleObject};
use chrono::{DateTime, Utc};

/// Public view of a freshly registered account.
#[derive(Debug, Clone, SimpleObject)]
pub struct AccountType {
    pub username: String,
    pub email: String,
}

impl From<User> for AccountType {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
        }
    }
}

/// The logged-in user.
#[derive(Debug, Clone, SimpleObject)]
pub struct UserNode {
    pub id: ID,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub verified: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserNode {
    fn from(user: User) -> Self {
        Self {
            id: ID::from(user.id.to_string()),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            verified: user.is_verified,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// Decoded access token claims.
#[derive(Debug, Clone, SimpleObject)]
pub struct TokenPayloadType {
    pub username: String,
    pub email: String,
    pub exp: i64,
    pub orig_iat: i64,
}

impl From<Claims> for TokenPayloadType {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username,
            email: claims.email,
            exp: claims.exp,
            orig_iat: claims.orig_iat,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct TokenType {
    pub token: String,
    pub payload: TokenPayloadType,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct RefreshTokenType {
    pub token: String,
    pub created: DateTime<Utc>,
    pub revoked: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
}

impl From<RefreshToken> for RefreshTokenType {
    fn from(token: RefreshToken) -> Self {
        Self {
            is_expired: token.is_expired(),
            token: token.token,
            created: token.created_at,
            revoked: token.revoked_at,
            expires_at: token.expires_at,
        }
    }
}

/// Result of login, refresh and password change.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "ObtainJSONWebTokenType")]
pub struct ObtainJsonWebTokenType {
    pub success: bool,
    pub user: Option<UserNode>,
    pub token: Option<TokenType>,
    pub refresh_token: Option<RefreshTokenType>,
}

impl From<TokenPair> for ObtainJsonWebTokenType {
    fn from(pair: TokenPair) -> Self {
        Self {
            success: true,
            user: Some(pair.user.into()),
            token: Some(TokenType {
                token: pair.access.token,
                payload: pair.access.claims.into(),
            }),
            refresh_token: Some(pair.refresh.into()),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct VerifyTokenType {
    pub success: bool,
    pub payload: TokenPayloadType,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct RevokeTokenType {
    pub success: bool,
    pub revoked: Option<DateTime<Utc>>,
}

/// Outcome of account operations that return nothing else.
#[derive(Debug, Clone, SimpleObject)]
pub struct MutationNormalOutput {
    pub success: bool,
}

impl MutationNormalOutput {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
