//! Core business logic for the authentication system.
//!
//! Issues, refreshes and revokes token pairs and runs the email-driven
//! account flows (activation, password reset, password set).

use crate::auth::models::TokenPair;
use crate::config::Config;
use crate::database::models::{CreateNewUser, RefreshToken, UpdateProfile, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::refresh_token_repository::RefreshTokenRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::email_service::EmailService;
use crate::services::user_service::{LoginIdentifier, UserService, user_conflict};
use crate::state::AppState;
use crate::utils::jwt::{Claims, JwtUtils, TokenAction};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Authentication service for handling login, token generation, and user management
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    jwt_utils: &'a JwtUtils,
    email_service: &'a EmailService,
    user_service: UserService<'a>,
    config: &'a Config,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService instance
    pub fn new(state: &'a AppState) -> Self {
        AuthService {
            pool: &state.pool,
            jwt_utils: &state.jwt,
            email_service: &state.email,
            user_service: UserService::new(&state.pool),
            config: &state.config,
        }
    }

    /// Registers an unverified user and sends the activation email.
    ///
    /// The insert and the email share one transaction: if sending fails the
    /// user is rolled back.
    pub async fn register(&self, new_user: CreateNewUser) -> ServiceResult<User> {
        let data = self.user_service.prepare_registration(new_user).await?;

        let mut tx = self.pool.begin().await?;
        let user = UserRepository::insert_user(&mut *tx, data)
            .await
            .map_err(user_conflict)?;

        if self.config.accounts.send_activation_email {
            let token = self
                .jwt_utils
                .generate_action_token(&user.email, TokenAction::Activation)?;
            if let Err(e) = self
                .email_service
                .send_activation_email(&user.email, &user.username, &token)
                .await
            {
                tracing::error!("Activation email to {} failed, rolling back: {}", user.email, e);
                tx.rollback().await?;
                return Err(e);
            }
        }

        tx.commit().await?;
        tracing::info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Authenticate user and issue a token pair.
    ///
    /// `identifier` may be an email address or a username.
    pub async fn token_auth(&self, identifier: &str, password: &str) -> ServiceResult<TokenPair> {
        let identifier = LoginIdentifier::parse(identifier);
        let user = self
            .user_service
            .authenticate_user(&identifier, password)
            .await?;

        if !user.is_verified && !self.config.accounts.allow_login_not_verified {
            return Err(ServiceError::permission_denied("Please verify your account."));
        }

        let pair = self.issue_pair(user, None).await?;
        UserRepository::new(self.pool)
            .touch_last_login(pair.user.id)
            .await?;

        tracing::info!("User {} logged in", pair.user.id);
        Ok(pair)
    }

    /// Decodes an access token.
    pub fn verify_token(&self, token: &str) -> ServiceResult<Claims> {
        self.jwt_utils.validate_token(token)
    }

    /// Exchanges a stored refresh token for a new pair.
    ///
    /// # Arguments
    /// * `refresh_token` - Opaque refresh token value
    /// * `revoke_refresh_token` - Revoke the presented token once the new pair exists
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        revoke_refresh_token: bool,
    ) -> ServiceResult<TokenPair> {
        let stored = self.usable_refresh_token(refresh_token).await?;

        let user = self.user_service.get_user_required(stored.user_id).await?;
        if !user.is_active {
            return Err(ServiceError::invalid_token("User is disabled"));
        }

        let pair = self
            .issue_pair(user, Some(stored.created_at.timestamp()))
            .await?;

        if revoke_refresh_token {
            RefreshTokenRepository::new(self.pool)
                .revoke(stored.id)
                .await?;
        }

        Ok(pair)
    }

    /// Revokes a stored refresh token.
    ///
    /// # Returns
    /// When the token was revoked
    pub async fn revoke_token(&self, refresh_token: &str) -> ServiceResult<DateTime<Utc>> {
        let repo = RefreshTokenRepository::new(self.pool);
        let stored = repo
            .find_by_token(refresh_token)
            .await?
            .ok_or_else(|| ServiceError::invalid_token("Invalid refresh token"))?;

        let revoked_at = repo
            .revoke(stored.id)
            .await?
            .ok_or_else(|| ServiceError::invalid_token("Invalid refresh token"))?;

        tracing::info!("Revoked refresh token {} of user {}", stored.id, stored.user_id);
        Ok(revoked_at)
    }

    /// Consumes an activation token.
    pub async fn verify_account(&self, token: &str) -> ServiceResult<User> {
        let email = self
            .jwt_utils
            .validate_action_token(token, TokenAction::Activation)?;
        let user = self.user_for_action_token(&email).await?;

        if user.is_verified {
            return Err(ServiceError::invalid_operation("Account already verified."));
        }

        UserRepository::new(self.pool).mark_verified(user.id).await?;
        tracing::info!("Verified account of user {}", user.id);
        self.user_service.get_user_required(user.id).await
    }

    pub async fn resend_activation_email(&self, email: &str) -> ServiceResult<()> {
        let user = self.user_service.get_user_by_email_required(email).await?;
        if user.is_verified {
            return Err(ServiceError::invalid_operation("Account already verified."));
        }

        let token = self
            .jwt_utils
            .generate_action_token(&user.email, TokenAction::Activation)?;
        self.email_service
            .send_activation_email(&user.email, &user.username, &token)
            .await
    }

    /// Emails a reset link, or a password-set link to accounts without a
    /// usable password.
    pub async fn send_password_reset_email(&self, email: &str) -> ServiceResult<()> {
        let user = self.user_service.get_user_by_email_required(email).await?;

        if user.has_usable_password() {
            let token = self
                .jwt_utils
                .generate_action_token(&user.email, TokenAction::PasswordReset)?;
            self.email_service
                .send_password_reset_email(&user.email, &user.username, &token)
                .await
        } else {
            let token = self
                .jwt_utils
                .generate_action_token(&user.email, TokenAction::PasswordSet)?;
            self.email_service
                .send_password_set_email(&user.email, &user.username, &token)
                .await
        }
    }

    /// Sets a new password from a reset link.
    ///
    /// Outstanding refresh tokens are revoked and, since the link proves
    /// ownership of the address, the account is marked verified.
    pub async fn password_reset(
        &self,
        token: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<()> {
        let email = self
            .jwt_utils
            .validate_action_token(token, TokenAction::PasswordReset)?;
        let user = self.user_for_action_token(&email).await?;

        self.user_service
            .set_password(&user, new_password1, new_password2)
            .await?;

        RefreshTokenRepository::new(self.pool)
            .revoke_all_for_user(user.id)
            .await?;
        if !user.is_verified {
            UserRepository::new(self.pool).mark_verified(user.id).await?;
        }
        Ok(())
    }

    /// Sets the first password of an account created without one.
    pub async fn password_set(
        &self,
        token: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<()> {
        let email = self
            .jwt_utils
            .validate_action_token(token, TokenAction::PasswordSet)?;
        let user = self.user_for_action_token(&email).await?;

        if user.has_usable_password() {
            return Err(ServiceError::invalid_operation(
                "Password already set for account.",
            ));
        }

        self.user_service
            .set_password(&user, new_password1, new_password2)
            .await
    }

    /// Changes the password of a logged-in user and issues a fresh pair.
    pub async fn password_change(
        &self,
        user: &User,
        old_password: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<TokenPair> {
        self.user_service.check_password(user, old_password).await?;
        self.user_service
            .set_password(user, new_password1, new_password2)
            .await?;

        RefreshTokenRepository::new(self.pool)
            .revoke_all_for_user(user.id)
            .await?;

        let user = self.user_service.get_user_required(user.id).await?;
        self.issue_pair(user, None).await
    }

    /// Updates profile fields of a verified user.
    pub async fn update_account(&self, user: &User, profile: UpdateProfile) -> ServiceResult<User> {
        self.require_verified(user)?;
        self.user_service.update_profile(user.id, profile).await
    }

    /// Deactivates the account after checking its password.
    pub async fn delete_account(&self, user: &User, password: &str) -> ServiceResult<()> {
        self.require_verified(user)?;
        self.user_service.check_password(user, password).await?;
        self.user_service.deactivate(user.id).await
    }

    /// Loads the active user behind an access token's claims.
    pub async fn current_user(&self, claims: &Claims) -> ServiceResult<Option<User>> {
        let user = UserRepository::new(self.pool)
            .get_user_by_id(claims.user_id()?)
            .await?;
        Ok(user.filter(|user| user.is_active))
    }

    async fn usable_refresh_token(&self, refresh_token: &str) -> ServiceResult<RefreshToken> {
        let stored = RefreshTokenRepository::new(self.pool)
            .find_by_token(refresh_token)
            .await?
            .ok_or_else(|| ServiceError::invalid_token("Invalid refresh token"))?;

        if stored.is_revoked() {
            return Err(ServiceError::revoked_token("Refresh token is revoked"));
        }
        if stored.is_expired() {
            return Err(ServiceError::expired_token("Refresh token is expired"));
        }

        Ok(stored)
    }

    async fn issue_pair(&self, user: User, orig_iat: Option<i64>) -> ServiceResult<TokenPair> {
        let access = self.jwt_utils.generate_token(&user, orig_iat)?;

        let (value, expires_at) = self.jwt_utils.generate_refresh_token();
        let refresh = RefreshTokenRepository::new(self.pool)
            .create_token(user.id, &value, expires_at)
            .await?;

        Ok(TokenPair {
            user,
            access,
            refresh,
        })
    }

    async fn user_for_action_token(&self, email: &str) -> ServiceResult<User> {
        UserRepository::new(self.pool)
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::invalid_token("Invalid token"))
    }

    fn require_verified(&self, user: &User) -> ServiceResult<()> {
        if user.is_verified {
            Ok(())
        } else {
            Err(ServiceError::permission_denied("Please verify your account."))
        }
    }
}
