//! Data access layer.
//!
//! Each repository wraps a borrowed connection pool and exposes the SQL for
//! one table (plus its join tables).

pub mod category_repository;
pub mod movie_repository;
pub mod refresh_token_repository;
pub mod user_repository;
