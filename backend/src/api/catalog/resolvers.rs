//! Catalog queries and mutations.
//!
//! Reads are public and only ever show active movies in listings. Every
//! mutation requires a staff user.

use super::models::{CategoryInput, CategoryType, MovieInput, MovieType, parse_id};
use crate::api::common::{app_state, service_error_to_graphql};
use crate::auth::guards::staff_required;
use crate::database::models::MovieData;
use crate::services::category_service::CategoryService;
use crate::services::media_service::ImageKind;
use crate::services::movie_service::MovieService;
use crate::state::AppState;
use async_graphql::{Context, ID, Object, Result, Upload};
use std::io::Read;

#[derive(Default)]
pub struct CatalogQuery;

#[Object]
impl CatalogQuery {
    /// Active movies.
    async fn movies(&self, ctx: &Context<'_>) -> Result<Vec<MovieType>> {
        let state = app_state(ctx)?;
        let movies = MovieService::new(&state.pool)
            .list_movies()
            .await
            .map_err(service_error_to_graphql)?;
        Ok(movies.into_iter().map(MovieType::from).collect())
    }

    async fn movie(&self, ctx: &Context<'_>, id: ID) -> Result<Option<MovieType>> {
        let state = app_state(ctx)?;
        let movie = MovieService::new(&state.pool)
            .get_movie(parse_id(&id)?)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(movie.map(MovieType::from))
    }

    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<CategoryType>> {
        let state = app_state(ctx)?;
        let categories = CategoryService::new(&state.pool)
            .list_categories()
            .await
            .map_err(service_error_to_graphql)?;
        Ok(categories.into_iter().map(CategoryType::from).collect())
    }

    /// Active movies tagged with the category slug.
    async fn movies_by_category(
        &self,
        ctx: &Context<'_>,
        category_slug: String,
    ) -> Result<Vec<MovieType>> {
        let state = app_state(ctx)?;
        let movies = MovieService::new(&state.pool)
            .movies_by_category(&category_slug)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(movies.into_iter().map(MovieType::from).collect())
    }
}

#[derive(Default)]
pub struct CatalogMutation;

#[Object]
impl CatalogMutation {
    async fn create_category(
        &self,
        ctx: &Context<'_>,
        category_data: CategoryInput,
    ) -> Result<CategoryType> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        let category = CategoryService::new(&state.pool)
            .create_category(category_data.into())
            .await
            .map_err(service_error_to_graphql)?;
        Ok(category.into())
    }

    async fn update_category(
        &self,
        ctx: &Context<'_>,
        category_id: ID,
        category_data: CategoryInput,
    ) -> Result<CategoryType> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        let category = CategoryService::new(&state.pool)
            .update_category(parse_id(&category_id)?, category_data.into())
            .await
            .map_err(service_error_to_graphql)?;
        Ok(category.into())
    }

    async fn delete_category(&self, ctx: &Context<'_>, category_id: ID) -> Result<bool> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        CategoryService::new(&state.pool)
            .delete_category(parse_id(&category_id)?)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(true)
    }

    async fn create_movie(&self, ctx: &Context<'_>, movie_data: MovieInput) -> Result<MovieType> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        save_movie(ctx, state, None, movie_data).await
    }

    /// Overwrites a movie; images without a new upload are kept.
    async fn update_movie(
        &self,
        ctx: &Context<'_>,
        movie_id: ID,
        movie_data: MovieInput,
    ) -> Result<MovieType> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        let id = parse_id(&movie_id)?;
        save_movie(ctx, state, Some(id), movie_data).await
    }

    async fn delete_movie(&self, ctx: &Context<'_>, movie_id: ID) -> Result<bool> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        MovieService::new(&state.pool)
            .delete_movie(parse_id(&movie_id)?)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(true)
    }

    /// Deletes every movie and returns how many were removed.
    async fn delete_all_movies(&self, ctx: &Context<'_>) -> Result<u64> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        MovieService::new(&state.pool)
            .delete_all_movies()
            .await
            .map_err(service_error_to_graphql)
    }
}

/// Checks the input, stores its uploads, then writes the movie.
///
/// Stored uploads are removed again when a later step fails.
async fn save_movie(
    ctx: &Context<'_>,
    state: &AppState,
    id: Option<i64>,
    input: MovieInput,
) -> Result<MovieType> {
    let service = MovieService::new(&state.pool);
    let (mut data, poster, backdrop) = movie_data_from_input(input)?;
    service
        .check(id, &data)
        .await
        .map_err(service_error_to_graphql)?;

    let mut stored = Vec::new();
    for (upload, kind) in [(poster, ImageKind::Poster), (backdrop, ImageKind::Backdrop)] {
        let Some(upload) = upload else { continue };
        let path = match store_upload(ctx, state, upload, kind).await {
            Ok(path) => path,
            Err(e) => {
                state.media.discard(&stored).await;
                return Err(e);
            }
        };
        match kind {
            ImageKind::Poster => data.poster_original = Some(path.clone()),
            ImageKind::Backdrop => data.backdrop_original = Some(path.clone()),
        }
        stored.push(path);
    }

    let saved = match id {
        Some(id) => service.update_movie(id, data).await,
        None => service.create_movie(data).await,
    };

    match saved {
        Ok(movie) => Ok(movie.into()),
        Err(e) => {
            state.media.discard(&stored).await;
            Err(service_error_to_graphql(e))
        }
    }
}

fn movie_data_from_input(
    input: MovieInput,
) -> Result<(MovieData, Option<Upload>, Option<Upload>)> {
    let category_ids = input
        .category_ids
        .iter()
        .map(parse_id)
        .collect::<Result<Vec<i64>>>()?;

    let data = MovieData {
        title: input.title,
        description: input.description,
        year: input.year,
        duration_minutes: input.duration_minutes,
        category_ids,
        is_new: input.is_new,
        is_active: input.is_active,
        is_student_production: input.is_student_production,
        is_from_festival: input.is_from_festival,
        poster_original: None,
        backdrop_original: None,
    };

    Ok((data, input.poster_original, input.backdrop_original))
}

async fn store_upload(
    ctx: &Context<'_>,
    state: &AppState,
    upload: Upload,
    kind: ImageKind,
) -> Result<String> {
    let value = upload.value(ctx)?;
    let filename = value.filename.clone();
    let mut reader = value.into_read();

    let content = tokio::task::spawn_blocking(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map(|_| bytes)
    })
    .await??;

    state
        .media
        .store_upload(kind, &filename, &content)
        .await
        .map_err(service_error_to_graphql)
}
