//! HTTP routes serving the GraphQL endpoint and its playground.

use crate::api::schema::AppSchema;
use crate::auth::middleware::resolve_viewer;
use crate::state::AppState;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Router,
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::get,
};

/// Executes a GraphQL request with the caller and request headers attached.
pub async fn graphql_handler(
    Extension(schema): Extension<AppSchema>,
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let viewer = resolve_viewer(&headers, &state.config, &state.jwt);

    schema
        .execute(req.into_inner().data(viewer).data(headers))
        .await
        .into()
}

/// GraphQL playground handler
pub async fn graphql_playground() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub fn graphql_router() -> Router {
    Router::new().route("/graphql", get(graphql_playground).post(graphql_handler))
}
