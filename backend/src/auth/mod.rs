//! Authentication module for managing user accounts, sessions, and access control.
//!
//! This module provides token issuing and account flows, the cookie bridge
//! used by token mutations, request-level viewer resolution and the access
//! checks protected resolvers run.

pub mod cookies;
pub mod guards;
pub mod middleware;
pub mod models;
pub mod service;
