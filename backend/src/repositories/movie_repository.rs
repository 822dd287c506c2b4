//! Database repository for the movie catalog.
//!
//! Provides CRUD operations for movies and maintains their many-to-many
//! relation with categories.

use crate::database::models::{Movie, MovieData};
use anyhow::Result;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const MOVIE_COLUMNS: &str = "m.id, m.title, m.description, m.year, m.duration_minutes, \
     m.poster_original, m.backdrop_original, m.is_new, m.is_active, m.is_student_production, \
     m.is_from_festival, m.created_at, m.updated_at";

/// Repository for movie database operations.
pub struct MovieRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> MovieRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a movie together with its category links.
    ///
    /// # Arguments
    /// * `data` - Movie attributes; absent uploads are stored as empty paths
    ///
    /// # Returns
    /// The newly created Movie
    pub async fn create_movie(&self, data: &MovieData) -> Result<Movie> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let movie = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (title, description, year, duration_minutes, poster_original,
                backdrop_original, is_new, is_active, is_student_production, is_from_festival,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, description, year, duration_minutes, poster_original,
                backdrop_original, is_new, is_active, is_student_production, is_from_festival,
                created_at, updated_at
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.year)
        .bind(data.duration_minutes)
        .bind(data.poster_original.as_deref().unwrap_or_default())
        .bind(data.backdrop_original.as_deref().unwrap_or_default())
        .bind(data.is_new)
        .bind(data.is_active)
        .bind(data.is_student_production)
        .bind(data.is_from_festival)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        Self::replace_categories(&mut *tx, movie.id, &data.category_ids).await?;
        tx.commit().await?;

        Ok(movie)
    }

    /// Overwrites a movie's attributes and replaces its category set.
    ///
    /// Images are only replaced when the data carries a new upload.
    ///
    /// # Returns
    /// `Some(Movie)` if the movie exists, `None` otherwise
    pub async fn update_movie(&self, id: i64, data: &MovieData) -> Result<Option<Movie>> {
        let mut tx = self.pool.begin().await?;

        let movie = sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
            SET title = ?,
                description = ?,
                year = ?,
                duration_minutes = ?,
                poster_original = COALESCE(?, poster_original),
                backdrop_original = COALESCE(?, backdrop_original),
                is_new = ?,
                is_active = ?,
                is_student_production = ?,
                is_from_festival = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING id, title, description, year, duration_minutes, poster_original,
                backdrop_original, is_new, is_active, is_student_production, is_from_festival,
                created_at, updated_at
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.year)
        .bind(data.duration_minutes)
        .bind(data.poster_original.as_deref())
        .bind(data.backdrop_original.as_deref())
        .bind(data.is_new)
        .bind(data.is_active)
        .bind(data.is_student_production)
        .bind(data.is_from_festival)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(movie) = movie else {
            return Ok(None);
        };

        Self::replace_categories(&mut *tx, movie.id, &data.category_ids).await?;
        tx.commit().await?;

        Ok(Some(movie))
    }

    async fn replace_categories(
        conn: &mut SqliteConnection,
        movie_id: i64,
        category_ids: &[i64],
    ) -> Result<()> {
        sqlx::query("DELETE FROM movie_categories WHERE movie_id = ?")
            .bind(movie_id)
            .execute(&mut *conn)
            .await?;

        for category_id in category_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO movie_categories (movie_id, category_id) VALUES (?, ?)",
            )
            .bind(movie_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn get_movie_by_id(&self, id: i64) -> Result<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m WHERE m.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(movie)
    }

    /// Lists movies visible to users.
    pub async fn list_active_movies(&self) -> Result<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m WHERE m.is_active = 1 ORDER BY m.id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(movies)
    }

    /// Lists visible movies tagged with the category `slug`.
    pub async fn list_active_movies_by_category_slug(&self, slug: &str) -> Result<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            r#"
            SELECT DISTINCT {MOVIE_COLUMNS}
            FROM movies m
            JOIN movie_categories mc ON mc.movie_id = m.id
            JOIN categories c ON c.id = mc.category_id
            WHERE m.is_active = 1 AND c.slug = ?
            ORDER BY m.id
            "#
        ))
        .bind(slug)
        .fetch_all(self.pool)
        .await?;

        Ok(movies)
    }

    /// Deletes a movie; its category links go with it.
    ///
    /// # Returns
    /// `true` if a row was removed
    pub async fn delete_movie(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every movie.
    ///
    /// # Returns
    /// Number of movie rows removed
    pub async fn delete_all_movies(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM movies").execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CreateCategory;
    use crate::database::test_pool;
    use crate::repositories::category_repository::CategoryRepository;

    fn movie(title: &str, category_ids: Vec<i64>, is_active: bool) -> MovieData {
        MovieData {
            title: title.to_string(),
            description: "A film".to_string(),
            year: 1999,
            duration_minutes: 136,
            category_ids,
            is_new: false,
            is_active,
            is_student_production: false,
            is_from_festival: false,
            poster_original: None,
            backdrop_original: None,
        }
    }

    #[tokio::test]
    async fn test_active_filter_and_category_filter() {
        let pool = test_pool().await;
        let categories = CategoryRepository::new(&pool);
        let scifi = categories
            .create_category(&CreateCategory {
                name: "Sci-Fi".to_string(),
                slug: "sci-fi".to_string(),
            })
            .await
            .unwrap();
        let drama = categories
            .create_category(&CreateCategory {
                name: "Drama".to_string(),
                slug: "drama".to_string(),
            })
            .await
            .unwrap();

        let repo = MovieRepository::new(&pool);
        let matrix = repo
            .create_movie(&movie("The Matrix", vec![scifi.id], true))
            .await
            .unwrap();
        repo.create_movie(&movie("Hidden", vec![scifi.id], false))
            .await
            .unwrap();
        repo.create_movie(&movie("Drama Film", vec![drama.id], true))
            .await
            .unwrap();

        let active = repo.list_active_movies().await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|m| m.is_active));

        let scifi_movies = repo
            .list_active_movies_by_category_slug("sci-fi")
            .await
            .unwrap();
        assert_eq!(scifi_movies.len(), 1);
        assert_eq!(scifi_movies[0].id, matrix.id);

        let tags = categories.get_categories_for_movie(matrix.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].slug, "sci-fi");
    }

    #[tokio::test]
    async fn test_update_keeps_images_and_replaces_categories() {
        let pool = test_pool().await;
        let categories = CategoryRepository::new(&pool);
        let first = categories
            .create_category(&CreateCategory {
                name: "First".to_string(),
                slug: "first".to_string(),
            })
            .await
            .unwrap();
        let second = categories
            .create_category(&CreateCategory {
                name: "Second".to_string(),
                slug: "second".to_string(),
            })
            .await
            .unwrap();

        let repo = MovieRepository::new(&pool);
        let mut data = movie("Original", vec![first.id], true);
        data.poster_original = Some("movies/posters/original.jpg".to_string());
        let created = repo.create_movie(&data).await.unwrap();

        let mut update = movie("Renamed", vec![second.id], true);
        update.duration_minutes = 90;
        let updated = repo.update_movie(created.id, &update).await.unwrap().unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.poster_original, "movies/posters/original.jpg");
        let tags = categories
            .get_categories_for_movie(created.id)
            .await
            .unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, second.id);

        assert!(repo.update_movie(9999, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_movies_counts_rows() {
        let pool = test_pool().await;
        let repo = MovieRepository::new(&pool);
        for title in ["One", "Two", "Three"] {
            repo.create_movie(&movie(title, Vec::new(), true))
                .await
                .unwrap();
        }

        assert_eq!(repo.delete_all_movies().await.unwrap(), 3);
        assert!(repo.list_active_movies().await.unwrap().is_empty());
        assert_eq!(repo.delete_all_movies().await.unwrap(), 0);
    }
}
