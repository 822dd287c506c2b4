//! Central module for organizing the application's GraphQL API.
//!
//! This module merges the catalog and identity domains into one schema and
//! exposes the routes serving it.

pub mod catalog;
pub mod common;
pub mod routes;
pub mod schema;
pub mod user;
