//! Moves tokens between GraphQL arguments and HttpOnly cookies.
//!
//! Clients running in a browser never see their tokens: login, refresh and
//! password change write both tokens into cookies, refresh and revoke read
//! the refresh token back from its cookie when the argument is missing or
//! the `cookie-mode` placeholder, and revoke always clears both cookies.

use crate::auth::models::TokenPair;
use crate::config::{COOKIE_MODE_PLACEHOLDER, CookieConfig};
use axum::http::{HeaderMap, header::COOKIE};
use cookie::Cookie;
use time::{Duration, OffsetDateTime};

pub struct CookieBridge<'a> {
    config: &'a CookieConfig,
}

impl<'a> CookieBridge<'a> {
    pub fn new(config: &'a CookieConfig) -> Self {
        Self { config }
    }

    /// The refresh token to use: the argument, unless it is absent, empty or
    /// the placeholder, in which case the refresh cookie (or an empty string).
    pub fn resolve_refresh_token(&self, argument: Option<&str>, headers: &HeaderMap) -> String {
        match argument.map(str::trim) {
            Some(value) if !value.is_empty() && value != COOKIE_MODE_PLACEHOLDER => {
                value.to_string()
            }
            _ => read_cookie(headers, &self.config.refresh_cookie).unwrap_or_default(),
        }
    }

    /// The access token carried by the auth cookie, if any.
    pub fn access_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.config.auth_cookie).filter(|value| !value.is_empty())
    }

    /// `Set-Cookie` values storing both tokens of `pair`.
    ///
    /// Each cookie lives as long as the token it carries.
    pub fn token_cookies(
        &self,
        pair: &TokenPair,
        access_lifetime_seconds: i64,
        refresh_lifetime_seconds: i64,
    ) -> Vec<String> {
        vec![
            self.build(
                &self.config.auth_cookie,
                pair.access.token.clone(),
                Duration::seconds(access_lifetime_seconds),
            )
            .to_string(),
            self.build(
                &self.config.refresh_cookie,
                pair.refresh.token.clone(),
                Duration::seconds(refresh_lifetime_seconds),
            )
            .to_string(),
        ]
    }

    /// `Set-Cookie` values deleting both token cookies.
    pub fn clear_cookies(&self) -> Vec<String> {
        [&self.config.auth_cookie, &self.config.refresh_cookie]
            .into_iter()
            .map(|name| {
                let mut cookie = self.build(name, String::new(), Duration::ZERO);
                cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
                cookie.to_string()
            })
            .collect()
    }

    fn build(&self, name: &str, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .http_only(self.config.http_only)
            .secure(self.config.secure)
            .same_site(self.config.same_site)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Finds a cookie by name across every `Cookie` header of the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
