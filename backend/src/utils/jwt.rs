//! JWT token utilities for authentication and account actions.
//!
//! Provides access token creation and validation, opaque refresh token
//! generation, and signed one-off tokens for account activation and password
//! resets.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::database::models::User;
use crate::errors::ServiceError;

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issued at timestamp
    pub iat: i64,
    /// Issue time of the first token in a refresh chain
    pub orig_iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, ServiceError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| ServiceError::invalid_token("Invalid token subject"))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// What a one-off account token authorizes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
    Activation,
    PasswordReset,
    PasswordSet,
}

/// Claims of activation / password reset tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionClaims {
    /// Email of the account the token was issued for
    pub sub: String,
    pub action: TokenAction,
    pub exp: i64,
    pub iat: i64,
}

/// An issued access token together with its decoded payload.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// JWT token utility for creating and validating tokens
#[derive(Clone)]
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtUtils {
    /// Create a new JwtUtils instance signing with `secret`.
    pub fn new(secret: &str, config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtUtils {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_token_lifetime(&self) -> i64 {
        self.config.expiration_seconds
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_token_lifetime(&self) -> i64 {
        self.config.refresh_expiration_seconds
    }

    /// Generate a new access token for `user`.
    ///
    /// `orig_iat` carries the issue time of the login that started the chain;
    /// pass `None` on a fresh login.
    pub fn generate_token(
        &self,
        user: &User,
        orig_iat: Option<i64>,
    ) -> Result<IssuedToken, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.expiration_seconds);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            orig_iat: orig_iat.unwrap_or_else(|| now.timestamp()),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// Validate and decode an access token
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(map_decode_error)
    }

    /// Generate an opaque refresh token value and its expiry.
    ///
    /// Refresh tokens are random 40-character hex strings persisted in the
    /// database, so they can be revoked individually.
    pub fn generate_refresh_token(&self) -> (String, DateTime<Utc>) {
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        let expires_at = Utc::now() + Duration::seconds(self.config.refresh_expiration_seconds);
        (hex::encode(bytes), expires_at)
    }

    /// Sign a one-off token for `email` authorizing `action`.
    pub fn generate_action_token(
        &self,
        email: &str,
        action: TokenAction,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = ActionClaims {
            sub: email.to_string(),
            action,
            exp: (now + Duration::seconds(self.config.action_token_expiration_seconds))
                .timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {e}")))
    }

    /// Validate a one-off token and check it was issued for `action`.
    ///
    /// # Returns
    /// The email the token was issued for
    pub fn validate_action_token(
        &self,
        token: &str,
        action: TokenAction,
    ) -> Result<String, ServiceError> {
        let claims = decode::<ActionClaims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(map_decode_error)?;

        if claims.action != action {
            return Err(ServiceError::invalid_token("Invalid token"));
        }

        Ok(claims.sub)
    }
}

fn map_decode_error(error: jsonwebtoken::errors::Error) -> ServiceError {
    match error.kind() {
        ErrorKind::ExpiredSignature => ServiceError::expired_token("Token has expired"),
        _ => ServiceError::invalid_token("Invalid token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TokenErrorKind;

    fn jwt(expiration_seconds: i64) -> JwtUtils {
        JwtUtils::new(
            "test-secret",
            JwtConfig {
                expiration_seconds,
                refresh_expiration_seconds: 7 * 24 * 60 * 60,
                action_token_expiration_seconds: 60 * 60,
            },
        )
    }

    fn user() -> User {
        User {
            id: 7,
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_verified: true,
            is_staff: false,
            date_joined: Utc::now(),
            last_login: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = jwt(900);
        let issued = jwt.generate_token(&user(), None).unwrap();
        let claims = jwt.validate_token(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.orig_iat, claims.iat);
    }

    #[test]
    fn test_expired_access_token() {
        let jwt = jwt(-60);
        let issued = jwt.generate_token(&user(), None).unwrap();

        match jwt.validate_token(&issued.token) {
            Err(ServiceError::Token { kind, .. }) => assert_eq!(kind, TokenErrorKind::Expired),
            other => panic!("expected expired token error, got {other:?}"),
        }
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issued = jwt(900).generate_token(&user(), None).unwrap();
        let other = JwtUtils::new(
            "another-secret",
            JwtConfig {
                expiration_seconds: 900,
                refresh_expiration_seconds: 60,
                action_token_expiration_seconds: 60,
            },
        );

        assert!(matches!(
            other.validate_token(&issued.token),
            Err(ServiceError::Token {
                kind: TokenErrorKind::Invalid,
                ..
            })
        ));
    }

    #[test]
    fn test_action_token_is_bound_to_action() {
        let jwt = jwt(900);
        let token = jwt
            .generate_action_token("test@example.com", TokenAction::Activation)
            .unwrap();

        assert_eq!(
            jwt.validate_action_token(&token, TokenAction::Activation)
                .unwrap(),
            "test@example.com"
        );
        assert!(
            jwt.validate_action_token(&token, TokenAction::PasswordReset)
                .is_err()
        );
    }

    #[test]
    fn test_refresh_tokens_are_unique_hex() {
        let jwt = jwt(900);
        let (first, expires_at) = jwt.generate_refresh_token();
        let (second, _) = jwt.generate_refresh_token();

        assert_eq!(first.len(), 40);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
        assert!(expires_at > Utc::now());
    }
}
