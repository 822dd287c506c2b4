//! Module for core business logic services.
//!
//! This module encapsulates services that perform specific business operations
//! and orchestrate interactions between different parts of the application,
//! such as validating catalog changes, storing images or sending account emails.

pub mod category_service;
pub mod email_service;
pub mod media_service;
pub mod movie_service;
pub mod user_service;
