//! Database repository for movie categories.
//!
//! Provides CRUD operations for genres such as "Sci-Fi" or "Action".

use crate::database::models::{Category, CreateCategory};
use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub struct CategoryRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_category(&self, category: &CreateCategory) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES (?, ?) RETURNING id, name, slug",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .fetch_one(self.pool)
        .await?;

        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: i64,
        category: &CreateCategory,
    ) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ?, slug = ? WHERE id = ? RETURNING id, name, slug",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }

    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_category_by_id(&self, id: i64) -> Result<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(category)
    }

    /// Checks whether a slug is taken, optionally ignoring one category.
    pub async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(-1))
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Lists all categories ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories ORDER BY name COLLATE NOCASE, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Returns the ids among `ids` that have no matching category.
    pub async fn find_missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM categories WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let existing: Vec<i64> = builder.build_query_scalar::<i64>().fetch_all(self.pool).await?;

        let mut missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !existing.contains(id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        Ok(missing)
    }

    /// Categories attached to a movie, ordered by name.
    pub async fn get_categories_for_movie(&self, movie_id: i64) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.slug
            FROM categories c
            JOIN movie_categories mc ON mc.category_id = c.id
            WHERE mc.movie_id = ?
            ORDER BY c.name COLLATE NOCASE, c.id
            "#,
        )
        .bind(movie_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;

    fn category(name: &str, slug: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn test_category_crud() {
        let pool = test_pool().await;
        let repo = CategoryRepository::new(&pool);

        let scifi = repo
            .create_category(&category("Sci-Fi", "sci-fi"))
            .await
            .unwrap();
        let action = repo
            .create_category(&category("Action", "action"))
            .await
            .unwrap();

        let names: Vec<String> = repo
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Action", "Sci-Fi"]);

        assert!(repo.slug_exists("sci-fi", None).await.unwrap());
        assert!(!repo.slug_exists("sci-fi", Some(scifi.id)).await.unwrap());

        let missing = repo
            .find_missing_ids(&[scifi.id, action.id, 404])
            .await
            .unwrap();
        assert_eq!(missing, vec![404]);

        let renamed = repo
            .update_category(action.id, &category("Adventure", "adventure"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.slug, "adventure");

        assert!(repo.delete_category(action.id).await.unwrap());
        assert!(!repo.delete_category(action.id).await.unwrap());
        assert!(repo.get_category_by_id(action.id).await.unwrap().is_none());
    }
}
