//! User business logic service.
//!
//! Handles registration checks, credential checks, profile and password
//! updates for user accounts.

use crate::config::AdminBootstrap;
use crate::database::models::{CreateNewUser, CreateUser, UpdateProfile, User};
use crate::errors::{ServiceError, ServiceResult, unique_violation};
use crate::repositories::refresh_token_repository::RefreshTokenRepository;
use crate::repositories::user_repository::UserRepository;
use crate::utils::password::{hash_password, validate_password, verify_password};
use sqlx::SqlitePool;
use validator::Validate;

/// How a user identifies themselves at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Username(String),
}

impl LoginIdentifier {
    /// Anything containing `@` is treated as an email address.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('@') {
            LoginIdentifier::Email(raw.to_string())
        } else {
            LoginIdentifier::Username(raw.to_string())
        }
    }
}

/// Maps a UNIQUE constraint failure on `users` to the duplicate message
/// registration reports; any other failure stays a database error.
pub fn user_conflict(error: anyhow::Error) -> ServiceError {
    match unique_violation(&error).as_deref() {
        Some("users.email") => ServiceError::already_exists("Email already exists"),
        Some("users.username") => ServiceError::already_exists("Username already exists"),
        _ => error.into(),
    }
}

pub struct UserService<'a> {
    /// Shared database connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserService<'a> {
    /// Creates a new UserService instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs every registration rule and prepares the row to insert.
    ///
    /// Password strength is checked first, then field formats, then that
    /// neither the email nor the username is taken.
    ///
    /// # Returns
    /// A `CreateUser` with the password hashed, ready for insertion
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Weak passwords
    /// - Malformed username or email
    /// - Duplicate email or username
    pub async fn prepare_registration(&self, new_user: CreateNewUser) -> ServiceResult<CreateUser> {
        validate_password(&new_user.password, &[&new_user.username, &new_user.email])?;

        new_user
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = UserRepository::new(self.pool);

        if repo.email_exists(&new_user.email).await? {
            return Err(ServiceError::already_exists("Email already exists"));
        }

        if repo.username_exists(&new_user.username).await? {
            return Err(ServiceError::already_exists("Username already exists"));
        }

        let password_hash = hash_password(&new_user.password).await?;

        Ok(CreateUser {
            username: new_user.username,
            email: new_user.email,
            password_hash,
            is_verified: false,
            is_staff: false,
        })
    }

    pub async fn find_by_identifier(&self, identifier: &LoginIdentifier) -> ServiceResult<Option<User>> {
        let repo = UserRepository::new(self.pool);
        let user = match identifier {
            LoginIdentifier::Email(email) => repo.get_user_by_email(email).await?,
            LoginIdentifier::Username(username) => repo.get_user_by_username(username).await?,
        };
        Ok(user)
    }

    /// Checks a login identifier and password.
    ///
    /// Unknown users, wrong passwords and inactive accounts all fail with the
    /// same message.
    pub async fn authenticate_user(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> ServiceResult<User> {
        let invalid = || ServiceError::validation("Please, enter valid credentials.");

        let user = self.find_by_identifier(identifier).await?.ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).await? || !user.is_active {
            return Err(invalid());
        }

        Ok(user)
    }

    /// Retrieves a user by ID with existence verification.
    ///
    /// # Errors
    /// Returns `ServiceError::NotFound` if user doesn't exist
    pub async fn get_user_required(&self, id: i64) -> ServiceResult<User> {
        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))?;
        Ok(user)
    }

    pub async fn get_user_by_email_required(&self, email: &str) -> ServiceResult<User> {
        let repo = UserRepository::new(self.pool);
        repo.get_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", email))
    }

    pub async fn update_profile(&self, user_id: i64, profile: UpdateProfile) -> ServiceResult<User> {
        profile
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = UserRepository::new(self.pool);
        repo.update_profile(user_id, &profile)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))
    }

    /// Fails unless `password` matches the user's current password.
    pub async fn check_password(&self, user: &User, password: &str) -> ServiceResult<()> {
        if verify_password(password, &user.password_hash).await? {
            Ok(())
        } else {
            Err(ServiceError::validation("Invalid password."))
        }
    }

    /// Validates a new password pair and stores its hash.
    pub async fn set_password(
        &self,
        user: &User,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<()> {
        if new_password1 != new_password2 {
            return Err(ServiceError::validation(
                "The two password fields didn't match.",
            ));
        }

        validate_password(new_password1, &[&user.username, &user.email])?;
        let password_hash = hash_password(new_password1).await?;

        let repo = UserRepository::new(self.pool);
        if !repo.update_password_hash(user.id, &password_hash).await? {
            return Err(ServiceError::not_found("User", user.id));
        }

        tracing::info!("Password updated for user {}", user.id);
        Ok(())
    }

    /// Deactivates an account and revokes its refresh tokens.
    pub async fn deactivate(&self, user_id: i64) -> ServiceResult<()> {
        let repo = UserRepository::new(self.pool);
        if !repo.deactivate_user(user_id).await? {
            return Err(ServiceError::not_found("User", user_id));
        }

        let revoked = RefreshTokenRepository::new(self.pool)
            .revoke_all_for_user(user_id)
            .await?;
        tracing::info!(
            "Deactivated user {} and revoked {} refresh tokens",
            user_id,
            revoked
        );
        Ok(())
    }

    pub async fn delete_all_users(&self) -> ServiceResult<u64> {
        let count = UserRepository::new(self.pool).delete_all_users().await?;
        tracing::warn!("Deleted all {} users", count);
        Ok(count)
    }

    /// Makes sure the configured staff account exists and can sign in.
    ///
    /// An existing account with that email is promoted; otherwise a verified
    /// staff user is created.
    pub async fn ensure_staff_user(&self, admin: &AdminBootstrap) -> ServiceResult<User> {
        let repo = UserRepository::new(self.pool);

        if let Some(user) = repo.get_user_by_email(&admin.email).await? {
            repo.promote_to_staff(user.id).await?;
            tracing::info!("Promoted existing user {} to staff", user.id);
            return self.get_user_required(user.id).await;
        }

        let password_hash = hash_password(&admin.password).await?;
        let user = repo
            .create_user(CreateUser {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password_hash,
                is_verified: true,
                is_staff: true,
            })
            .await
            .map_err(user_conflict)?;

        tracing::info!("Created staff user {}", user.username);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;

    fn registration(username: &str, email: &str, password: &str) -> CreateNewUser {
        CreateNewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_login_identifier() {
        assert_eq!(
            LoginIdentifier::parse("test@example.com"),
            LoginIdentifier::Email("test@example.com".to_string())
        );
        assert_eq!(
            LoginIdentifier::parse(" testuser "),
            LoginIdentifier::Username("testuser".to_string())
        );
    }

    #[tokio::test]
    async fn test_prepare_registration_rules() {
        let pool = test_pool().await;
        let service = UserService::new(&pool);

        let data = service
            .prepare_registration(registration("testuser", "test@example.com", "Str0ng!Passw0rd123"))
            .await
            .unwrap();
        assert_ne!(data.password_hash, "Str0ng!Passw0rd123");
        assert!(verify_password("Str0ng!Passw0rd123", &data.password_hash).await.unwrap());
        assert!(!data.is_verified);
        UserRepository::new(&pool).create_user(data).await.unwrap();

        let duplicate_email = service
            .prepare_registration(registration("other", "test@example.com", "Str0ng!Passw0rd123"))
            .await
            .unwrap_err();
        assert_eq!(duplicate_email.to_string(), "Email already exists");

        let duplicate_username = service
            .prepare_registration(registration("testuser", "other@example.com", "Str0ng!Passw0rd123"))
            .await
            .unwrap_err();
        assert_eq!(duplicate_username.to_string(), "Username already exists");

        let weak = service
            .prepare_registration(registration("weak", "weak@example.com", "12345"))
            .await
            .unwrap_err();
        assert!(weak.to_string().contains("Weak Password"));
    }

    #[tokio::test]
    async fn test_authenticate_user() {
        let pool = test_pool().await;
        let service = UserService::new(&pool);
        let data = service
            .prepare_registration(registration("testuser", "test@example.com", "Str0ng!Passw0rd123"))
            .await
            .unwrap();
        let user = UserRepository::new(&pool).create_user(data).await.unwrap();

        let by_email = service
            .authenticate_user(&LoginIdentifier::parse("test@example.com"), "Str0ng!Passw0rd123")
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_username = service
            .authenticate_user(&LoginIdentifier::parse("testuser"), "Str0ng!Passw0rd123")
            .await
            .unwrap();
        assert_eq!(by_username.id, user.id);

        assert!(
            service
                .authenticate_user(&LoginIdentifier::parse("testuser"), "wrong")
                .await
                .is_err()
        );

        service.deactivate(user.id).await.unwrap();
        assert!(
            service
                .authenticate_user(&LoginIdentifier::parse("testuser"), "Str0ng!Passw0rd123")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_set_password_requires_matching_pair() {
        let pool = test_pool().await;
        let service = UserService::new(&pool);
        let data = service
            .prepare_registration(registration("testuser", "test@example.com", "Str0ng!Passw0rd123"))
            .await
            .unwrap();
        let user = UserRepository::new(&pool).create_user(data).await.unwrap();

        assert!(
            service
                .set_password(&user, "N3w!Passw0rd456", "N3w!Passw0rd457")
                .await
                .is_err()
        );

        service
            .set_password(&user, "N3w!Passw0rd456", "N3w!Passw0rd456")
            .await
            .unwrap();
        let reloaded = service.get_user_required(user.id).await.unwrap();
        assert!(service.check_password(&reloaded, "N3w!Passw0rd456").await.is_ok());
        assert!(service.check_password(&reloaded, "Str0ng!Passw0rd123").await.is_err());
    }

    #[tokio::test]
    async fn test_unique_constraints_map_to_duplicate_messages() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let user = |username: &str, email: &str| CreateUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            is_verified: false,
            is_staff: false,
        };

        repo.create_user(user("alice", "same@example.com"))
            .await
            .unwrap();

        // emails differing only in case collide in the table itself
        let error = repo
            .create_user(user("bob", "SAME@Example.com"))
            .await
            .map_err(user_conflict)
            .unwrap_err();
        assert!(
            matches!(&error, ServiceError::AlreadyExists { message } if message == "Email already exists")
        );

        let error = repo
            .create_user(user("alice", "other@example.com"))
            .await
            .map_err(user_conflict)
            .unwrap_err();
        assert!(
            matches!(&error, ServiceError::AlreadyExists { message } if message == "Username already exists")
        );

        let found = repo.get_user_by_email("Same@Example.COM").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn test_ensure_staff_user_is_idempotent() {
        let pool = test_pool().await;
        let service = UserService::new(&pool);
        let admin = AdminBootstrap {
            email: "admin@example.com".to_string(),
            username: "admin".to_string(),
            password: "Adm1n!Passw0rd".to_string(),
        };

        let first = service.ensure_staff_user(&admin).await.unwrap();
        let second = service.ensure_staff_user(&admin).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_staff);
        assert!(second.is_verified);
    }
}
