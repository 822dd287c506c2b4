//! Router assembly: routes, shared extensions and the middleware stack.

use crate::api;
use crate::api::schema::create_schema;
use crate::auth::middleware::allowed_hosts;
use crate::state::AppState;
use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::Json,
    routing::get,
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();
    let schema = create_schema(state.clone());

    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin '{origin}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let media_path = match config.media_url.trim_end_matches('/') {
        path if path.starts_with('/') && path.len() > 1 => path.to_string(),
        _ => "/media".to_string(),
    };

    let app = Router::new()
        .route("/", get(root_handler))
        .merge(api::routes::graphql_router())
        .nest_service(&media_path, ServeDir::new(&config.media_root))
        .layer(Extension(schema))
        .layer(Extension(state))
        .layer(middleware::from_fn_with_state(config, allowed_hosts))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": "Tau Backend",
        "version": env!("CARGO_PKG_VERSION"),
        "graphql": "/graphql",
    }))
}
