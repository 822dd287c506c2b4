//! GraphQL types and inputs of the movie catalog.

use crate::api::common::{app_state, service_error_to_graphql};
use crate::database::models::{Category, CreateCategory, Movie};
use crate::errors::ServiceError;
use crate::services::category_service::CategoryService;
use crate::services::media_service::{BACKDROP_LARGE, ImageSpec, POSTER_DESKTOP, POSTER_MOBILE};
use async_graphql::{Context, ID, InputObject, Object, Result, SimpleObject, Upload};

#[derive(Debug, Clone, SimpleObject)]
pub struct CategoryType {
    pub id: ID,
    pub name: String,
    pub slug: String,
}

impl From<Category> for CategoryType {
    fn from(category: Category) -> Self {
        Self {
            id: ID::from(category.id.to_string()),
            name: category.name,
            slug: category.slug,
        }
    }
}

pub struct MovieType(pub Movie);

impl From<Movie> for MovieType {
    fn from(movie: Movie) -> Self {
        Self(movie)
    }
}

#[Object]
impl MovieType {
    async fn id(&self) -> ID {
        ID::from(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> &str {
        &self.0.description
    }

    async fn year(&self) -> i32 {
        self.0.year
    }

    async fn duration_minutes(&self) -> i32 {
        self.0.duration_minutes
    }

    /// e.g. "1h 45min"
    async fn duration_formatted(&self) -> String {
        self.0.duration_formatted()
    }

    async fn is_new(&self) -> bool {
        self.0.is_new
    }

    async fn is_active(&self) -> bool {
        self.0.is_active
    }

    async fn is_student_production(&self) -> bool {
        self.0.is_student_production
    }

    async fn is_from_festival(&self) -> bool {
        self.0.is_from_festival
    }

    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<CategoryType>> {
        let state = app_state(ctx)?;
        let categories = CategoryService::new(&state.pool)
            .categories_for_movie(self.0.id)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(categories.into_iter().map(CategoryType::from).collect())
    }

    async fn poster_original_url(&self, ctx: &Context<'_>) -> Result<String> {
        Ok(app_state(ctx)?.media.original_url(&self.0.poster_original))
    }

    async fn poster_mobile_url(&self, ctx: &Context<'_>) -> Result<String> {
        derivative(ctx, &self.0.poster_original, &POSTER_MOBILE).await
    }

    async fn poster_desktop_url(&self, ctx: &Context<'_>) -> Result<String> {
        derivative(ctx, &self.0.poster_original, &POSTER_DESKTOP).await
    }

    async fn backdrop_original_url(&self, ctx: &Context<'_>) -> Result<String> {
        Ok(app_state(ctx)?.media.original_url(&self.0.backdrop_original))
    }

    async fn backdrop_large_url(&self, ctx: &Context<'_>) -> Result<String> {
        derivative(ctx, &self.0.backdrop_original, &BACKDROP_LARGE).await
    }

    async fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.created_at
    }
}

async fn derivative(ctx: &Context<'_>, original: &str, spec: &ImageSpec) -> Result<String> {
    app_state(ctx)?
        .media
        .derivative_url(original, spec)
        .await
        .map_err(service_error_to_graphql)
}

#[derive(Debug, InputObject)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
}

impl From<CategoryInput> for CreateCategory {
    fn from(input: CategoryInput) -> Self {
        Self {
            name: input.name,
            slug: input.slug,
        }
    }
}

#[derive(InputObject)]
pub struct MovieInput {
    pub title: String,
    pub description: String,
    pub year: i32,
    pub duration_minutes: i32,
    pub category_ids: Vec<ID>,
    pub is_new: bool,
    pub is_student_production: bool,
    pub is_from_festival: bool,
    #[graphql(default = true)]
    pub is_active: bool,
    pub poster_original: Option<Upload>,
    pub backdrop_original: Option<Upload>,
}

/// Parses GraphQL ids into database ids.
pub fn parse_id(id: &ID) -> Result<i64> {
    id.parse::<i64>().map_err(|_| {
        service_error_to_graphql(ServiceError::validation(format!(
            "'{}' is not a valid id",
            id.as_str()
        )))
    })
}
