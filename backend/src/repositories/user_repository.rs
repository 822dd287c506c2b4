//! Database repository for user management operations.
//!
//! Provides CRUD operations for system users

use crate::database::models::{CreateUser, UpdateProfile, User};
use anyhow::Result;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     is_active, is_verified, is_staff, date_joined, last_login, updated_at";

/// Repository for user database operations.
///
/// Handles all persistence operations for the User entity.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Creates a new UserRepository instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new user in the database.
    ///
    /// # Arguments
    /// * `user` - CreateUser DTO containing user details
    ///
    /// # Returns
    /// The newly created User with all fields populated
    pub async fn create_user(&self, user: CreateUser) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_user(&mut conn, user).await
    }

    /// Inserts a user on an existing connection, typically inside a transaction.
    pub async fn insert_user(conn: &mut SqliteConnection, user: CreateUser) -> Result<User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, is_active, is_verified, is_staff, date_joined, updated_at)
            VALUES (?, ?, ?, 1, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(user.is_staff)
        .bind(now)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their unique identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// `Some(User)` if found, `None` otherwise
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their email, ignoring case.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Checks if a username already exists in the system.
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Checks if an email already exists in the system, ignoring case.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Marks a user's email address as verified.
    pub async fn mark_verified(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_verified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates optional profile fields, leaving absent ones untouched.
    pub async fn update_profile(&self, id: i64, profile: &UpdateProfile) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Replaces the stored password hash.
    pub async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deactivates a user without removing the row.
    pub async fn deactivate_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Grants staff rights and marks the account verified.
    pub async fn promote_to_staff(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_staff = 1, is_verified = 1, is_active = 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful login.
    pub async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Removes every user; refresh tokens go with them through the cascade.
    ///
    /// # Returns
    /// Number of users removed
    pub async fn delete_all_users(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users").execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;

    fn new_user(username: &str, email: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_verified: false,
            is_staff: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let user = repo
            .create_user(new_user("testuser", "test@example.com"))
            .await
            .unwrap();
        assert!(user.is_active);
        assert!(!user.is_verified);

        let by_email = repo.get_user_by_email("TEST@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));

        let by_username = repo.get_user_by_username("testuser").await.unwrap();
        assert_eq!(by_username.map(|u| u.id), Some(user.id));

        assert!(repo.email_exists("test@example.com").await.unwrap());
        assert!(repo.username_exists("testuser").await.unwrap());
        assert!(!repo.username_exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        repo.create_user(new_user("one", "same@example.com"))
            .await
            .unwrap();
        assert!(
            repo.create_user(new_user("two", "same@example.com"))
                .await
                .is_err()
        );
        assert!(
            repo.create_user(new_user("one", "other@example.com"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_profile_update_and_deactivation() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let user = repo
            .create_user(new_user("profile", "profile@example.com"))
            .await
            .unwrap();

        let updated = repo
            .update_profile(
                user.id,
                &UpdateProfile {
                    first_name: Some("Ada".to_string()),
                    last_name: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.last_name, "");

        assert!(repo.deactivate_user(user.id).await.unwrap());
        let user = repo.get_user_by_id(user.id).await.unwrap().unwrap();
        assert!(!user.is_active);

        assert_eq!(repo.delete_all_users().await.unwrap(), 1);
    }
}
