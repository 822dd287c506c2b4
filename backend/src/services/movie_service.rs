//! Movie business logic service.
//!
//! Validates movie data, checks referenced categories and forwards to the
//! movie repository.

use crate::database::models::{Movie, MovieData};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::movie_repository::MovieRepository;
use crate::services::category_service::CategoryService;
use sqlx::SqlitePool;
use validator::Validate;

pub struct MovieService<'a> {
    /// Shared database connection pool
    pool: &'a SqlitePool,
}

impl<'a> MovieService<'a> {
    /// Creates a new MovieService instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Active movies in insertion order.
    pub async fn list_movies(&self) -> ServiceResult<Vec<Movie>> {
        Ok(MovieRepository::new(self.pool).list_active_movies().await?)
    }

    /// Active movies tagged with the category `slug`.
    pub async fn movies_by_category(&self, slug: &str) -> ServiceResult<Vec<Movie>> {
        Ok(MovieRepository::new(self.pool)
            .list_active_movies_by_category_slug(slug)
            .await?)
    }

    /// Any movie by id, including inactive ones.
    pub async fn get_movie(&self, id: i64) -> ServiceResult<Option<Movie>> {
        Ok(MovieRepository::new(self.pool).get_movie_by_id(id).await?)
    }

    /// Creates a movie with full validation.
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Validation failures
    /// - Unknown category ids
    pub async fn create_movie(&self, data: MovieData) -> ServiceResult<Movie> {
        self.validate(&data).await?;

        let movie = MovieRepository::new(self.pool).create_movie(&data).await?;
        tracing::info!("Created movie {} ({})", movie.id, movie.title);
        Ok(movie)
    }

    /// Overwrites a movie; absent uploads keep the current images.
    pub async fn update_movie(&self, id: i64, data: MovieData) -> ServiceResult<Movie> {
        self.validate(&data).await?;

        let movie = MovieRepository::new(self.pool)
            .update_movie(id, &data)
            .await?
            .ok_or_else(|| ServiceError::not_found("Movie", id))?;
        tracing::info!("Updated movie {}", movie.id);
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: i64) -> ServiceResult<()> {
        if !MovieRepository::new(self.pool).delete_movie(id).await? {
            return Err(ServiceError::not_found("Movie", id));
        }
        tracing::info!("Deleted movie {}", id);
        Ok(())
    }

    /// Deletes the whole catalog of movies.
    ///
    /// # Returns
    /// Number of movies removed
    pub async fn delete_all_movies(&self) -> ServiceResult<u64> {
        let count = MovieRepository::new(self.pool).delete_all_movies().await?;
        tracing::warn!("Deleted all {} movies", count);
        Ok(count)
    }

    /// Runs the checks a create (`id` is `None`) or an update of `id` would,
    /// without writing anything.
    pub async fn check(&self, id: Option<i64>, data: &MovieData) -> ServiceResult<()> {
        if let Some(id) = id {
            if self.get_movie(id).await?.is_none() {
                return Err(ServiceError::not_found("Movie", id));
            }
        }
        self.validate(data).await
    }

    async fn validate(&self, data: &MovieData) -> ServiceResult<()> {
        data.validate()
            .map_err(ServiceError::from_validation_errors)?;

        CategoryService::new(self.pool)
            .ensure_categories_exist(&data.category_ids)
            .await
    }
}
