//! Request-level authentication helpers and the allowed-hosts filter.
//!
//! The viewer is resolved from `Authorization: JWT <token>` (or `Bearer`)
//! and falls back to the access token cookie.

use crate::auth::cookies::CookieBridge;
use crate::auth::models::Viewer;
use crate::config::Config;
use crate::utils::jwt::JwtUtils;
use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, HOST},
    },
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const AUTH_SCHEMES: &[&str] = &["JWT ", "Bearer "];

/// Extracts the raw access token from the request, header first.
pub fn access_token_from_headers(headers: &HeaderMap, config: &Config) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            AUTH_SCHEMES
                .iter()
                .find_map(|scheme| header.strip_prefix(scheme))
        })
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    from_header.or_else(|| CookieBridge::new(&config.cookies).access_token(headers))
}

/// Resolves the caller; invalid or expired tokens make an anonymous viewer.
pub fn resolve_viewer(headers: &HeaderMap, config: &Config, jwt_utils: &JwtUtils) -> Viewer {
    let Some(token) = access_token_from_headers(headers, config) else {
        return Viewer::anonymous();
    };

    match jwt_utils.validate_token(&token) {
        Ok(claims) => Viewer::authenticated(claims),
        Err(e) => {
            tracing::debug!("Ignoring access token: {}", e);
            Viewer::anonymous()
        }
    }
}

/// Rejects requests whose Host header is not in `ALLOWED_HOSTS`.
pub async fn allowed_hosts(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|header| header.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default();

    if !config.is_host_allowed(host) {
        tracing::warn!("Rejected request for disallowed host '{}'", host);
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::database::models::User;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn signed_token(jwt_utils: &JwtUtils) -> String {
        let now = Utc::now();
        let user = User {
            id: 3,
            email: "test@example.com".to_string(),
            username: "testuser".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_verified: true,
            is_staff: false,
            date_joined: now,
            last_login: None,
            updated_at: now,
        };
        jwt_utils.generate_token(&user, None).unwrap().token
    }

    #[test]
    fn test_header_schemes_and_cookie_fallback() {
        let config = test_config();
        let jwt_utils = JwtUtils::new(&config.secret_key, config.jwt.clone());
        let token = signed_token(&jwt_utils);

        for scheme in ["JWT", "Bearer"] {
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("{scheme} {token}")).unwrap(),
            );
            let viewer = resolve_viewer(&headers, &config, &jwt_utils);
            assert_eq!(viewer.claims.unwrap().user_id().unwrap(), 3);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("tau_auth_token={token}")).unwrap(),
        );
        assert!(resolve_viewer(&headers, &config, &jwt_utils).is_authenticated());
    }

    #[test]
    fn test_invalid_token_is_anonymous() {
        let config = test_config();
        let jwt_utils = JwtUtils::new(&config.secret_key, config.jwt.clone());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("JWT garbage"));
        assert!(!resolve_viewer(&headers, &config, &jwt_utils).is_authenticated());
        assert!(!resolve_viewer(&HeaderMap::new(), &config, &jwt_utils).is_authenticated());
    }
}
