//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these differ from the GraphQL-facing types in
//! `api`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::LazyLock;
use validator::Validate;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Accounts created without a password cannot log in until one is set.
    pub fn has_usable_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNewUser {
    #[validate(length(
        min = 1,
        max = 150,
        message = "Username must be between 1-150 characters"
    ))]
    pub username: String,

    #[validate(
        email(message = "Must be a valid email"),
        length(max = 254, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(max = 150, message = "First name too long"))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Last name too long"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCategory {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Category name must be between 1-100 characters"
    ))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be between 1-50 characters"),
        regex(
            path = *SLUG_RE,
            message = "Slug may only contain letters, numbers, underscores or hyphens"
        )
    )]
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub duration_minutes: i32,
    /// Path of the uploaded poster relative to the media root, empty if none.
    pub poster_original: String,
    /// Path of the uploaded backdrop relative to the media root, empty if none.
    pub backdrop_original: String,
    pub is_new: bool,
    pub is_active: bool,
    pub is_student_production: bool,
    pub is_from_festival: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// Human-readable runtime, e.g. 105 minutes becomes "1h 45min".
    pub fn duration_formatted(&self) -> String {
        format_duration(self.duration_minutes)
    }
}

pub fn format_duration(duration_minutes: i32) -> String {
    if duration_minutes <= 0 {
        return String::new();
    }

    let hours = duration_minutes / 60;
    let minutes = duration_minutes % 60;

    match (hours, minutes) {
        (0, m) => format!("{m}min"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}min"),
    }
}

/// Movie attributes written on create and update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovieData {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1-200 characters"))]
    pub title: String,

    pub description: String,

    #[validate(range(min = 1800, max = 3000, message = "Year is out of range"))]
    pub year: i32,

    #[validate(range(min = 0, message = "Duration must not be negative"))]
    pub duration_minutes: i32,

    pub category_ids: Vec<i64>,
    pub is_new: bool,
    pub is_active: bool,
    pub is_student_production: bool,
    pub is_from_festival: bool,

    /// Relative media path of a newly stored poster, if one was uploaded.
    pub poster_original: Option<String>,
    /// Relative media path of a newly stored backdrop, if one was uploaded.
    pub backdrop_original: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(105), "1h 45min");
        assert_eq!(format_duration(120), "2h");
        assert_eq!(format_duration(45), "45min");
        assert_eq!(format_duration(0), "");
    }

    #[test]
    fn test_category_slug_validation() {
        let valid = CreateCategory {
            name: "Sci-Fi".to_string(),
            slug: "sci-fi".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateCategory {
            name: "Sci-Fi".to_string(),
            slug: "sci fi!".to_string(),
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("slug"));
    }

    #[test]
    fn test_user_email_validation() {
        let user = CreateNewUser {
            username: "testuser".to_string(),
            email: "not-an-email".to_string(),
            password: "Str0ng!Passw0rd123".to_string(),
        };
        let errors = user.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
