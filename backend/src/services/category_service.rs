//! Category business logic service.

use crate::database::models::{Category, CreateCategory};
use crate::errors::{ServiceError, ServiceResult, unique_violation};
use crate::repositories::category_repository::CategoryRepository;
use sqlx::SqlitePool;
use validator::Validate;

pub struct CategoryService<'a> {
    /// Shared database connection pool
    pool: &'a SqlitePool,
}

impl<'a> CategoryService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(CategoryRepository::new(self.pool).list_categories().await?)
    }

    pub async fn categories_for_movie(&self, movie_id: i64) -> ServiceResult<Vec<Category>> {
        Ok(CategoryRepository::new(self.pool)
            .get_categories_for_movie(movie_id)
            .await?)
    }

    /// Creates a category after checking the slug is free.
    pub async fn create_category(&self, data: CreateCategory) -> ServiceResult<Category> {
        data.validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = CategoryRepository::new(self.pool);
        if repo.slug_exists(&data.slug, None).await? {
            return Err(slug_taken(&data.slug));
        }

        let category = repo
            .create_category(&data)
            .await
            .map_err(|e| slug_conflict(&data.slug, e))?;
        tracing::info!("Created category {} ({})", category.name, category.slug);
        Ok(category)
    }

    pub async fn update_category(&self, id: i64, data: CreateCategory) -> ServiceResult<Category> {
        data.validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = CategoryRepository::new(self.pool);
        if repo.get_category_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found("Category", id));
        }
        if repo.slug_exists(&data.slug, Some(id)).await? {
            return Err(slug_taken(&data.slug));
        }

        repo.update_category(id, &data)
            .await
            .map_err(|e| slug_conflict(&data.slug, e))?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    pub async fn delete_category(&self, id: i64) -> ServiceResult<()> {
        if !CategoryRepository::new(self.pool).delete_category(id).await? {
            return Err(ServiceError::not_found("Category", id));
        }
        tracing::info!("Deleted category {}", id);
        Ok(())
    }

    /// Fails with a not-found error naming the first unknown id.
    pub async fn ensure_categories_exist(&self, ids: &[i64]) -> ServiceResult<()> {
        let missing = CategoryRepository::new(self.pool)
            .find_missing_ids(ids)
            .await?;
        match missing.first() {
            Some(id) => Err(ServiceError::not_found("Category", id)),
            None => Ok(()),
        }
    }
}

fn slug_taken(slug: &str) -> ServiceError {
    ServiceError::already_exists(format!("Category with slug '{slug}' already exists"))
}

/// A slug that passed the pre-check but lost to a concurrent write.
fn slug_conflict(slug: &str, error: anyhow::Error) -> ServiceError {
    match unique_violation(&error).as_deref() {
        Some("categories.slug") => slug_taken(slug),
        _ => error.into(),
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
    async fn test_slug_rules() {
        let pool = test_pool().await;
        let service = CategoryService::new(&pool);

        let scifi = service
            .create_category(category("Sci-Fi", "sci-fi"))
            .await
            .unwrap();

        let duplicate = service
            .create_category(category("Science Fiction", "sci-fi"))
            .await
            .unwrap_err();
        assert!(matches!(duplicate, ServiceError::AlreadyExists { .. }));

        let invalid = service
            .create_category(category("Bad", "not a slug"))
            .await
            .unwrap_err();
        assert!(matches!(invalid, ServiceError::Validation { .. }));

        // keeping its own slug is not a conflict
        let renamed = service
            .update_category(scifi.id, category("Science Fiction", "sci-fi"))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Science Fiction");

        assert!(service.ensure_categories_exist(&[scifi.id]).await.is_ok());
        assert!(matches!(
            service.ensure_categories_exist(&[scifi.id, 77]).await,
            Err(ServiceError::NotFound { .. })
        ));

        let error = CategoryRepository::new(&pool)
            .create_category(&category("Other", "sci-fi"))
            .await
            .map_err(|e| slug_conflict("sci-fi", e))
            .unwrap_err();
        assert_eq!(error.to_string(), "Category with slug 'sci-fi' already exists");

        service.delete_category(scifi.id).await.unwrap();
        assert!(matches!(
            service.delete_category(scifi.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
