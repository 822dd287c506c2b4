//! Module for the movie catalog part of the GraphQL API.

pub mod models;
pub mod resolvers;
