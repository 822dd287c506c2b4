//! Database repository for long-running refresh tokens.

use crate::database::models::RefreshToken;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct RefreshTokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RefreshTokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores a freshly issued refresh token.
    pub async fn create_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, token, created_at, expires_at, revoked_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(token)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, created_at, expires_at, revoked_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(token)
    }

    /// Revokes a single token; already revoked tokens keep their original timestamp.
    ///
    /// # Returns
    /// The revocation timestamp, or `None` if the token does not exist
    pub async fn revoke(&self, id: i64) -> Result<Option<DateTime<Utc>>> {
        let revoked_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = COALESCE(revoked_at, ?)
            WHERE id = ?
            RETURNING revoked_at
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(revoked_at)
    }

    /// Revokes every outstanding token of a user.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Removes tokens that can no longer be used.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CreateUser;
    use crate::database::test_pool;
    use crate::repositories::user_repository::UserRepository;
    use chrono::Duration;

    #[tokio::test]
    async fn test_revocation_is_sticky() {
        let pool = test_pool().await;
        let user = UserRepository::new(&pool)
            .create_user(CreateUser {
                username: "tokens".to_string(),
                email: "tokens@example.com".to_string(),
                password_hash: "hash".to_string(),
                is_verified: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let repo = RefreshTokenRepository::new(&pool);
        let token = repo
            .create_token(user.id, "abc123", Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert!(!token.is_revoked());
        assert!(!token.is_expired());

        let first = repo.revoke(token.id).await.unwrap().unwrap();
        let second = repo.revoke(token.id).await.unwrap().unwrap();
        assert_eq!(first, second);

        let stored = repo.find_by_token("abc123").await.unwrap().unwrap();
        assert!(stored.is_revoked());
        assert!(repo.revoke(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let pool = test_pool().await;
        let user = UserRepository::new(&pool)
            .create_user(CreateUser {
                username: "cleanup".to_string(),
                email: "cleanup@example.com".to_string(),
                password_hash: "hash".to_string(),
                is_verified: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let repo = RefreshTokenRepository::new(&pool);
        repo.create_token(user.id, "old", Utc::now() - Duration::days(1))
            .await
            .unwrap();
        repo.create_token(user.id, "fresh", Utc::now() + Duration::days(1))
            .await
            .unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
        assert!(repo.find_by_token("old").await.unwrap().is_none());
        assert!(repo.find_by_token("fresh").await.unwrap().is_some());
    }
}
