//! Module for the identity part of the GraphQL API.
//!
//! Registration, login and token handling, and account management.

pub mod models;
pub mod resolvers;
