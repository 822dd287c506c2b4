//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! database URLs, server port, token lifetimes, cookie flags, email delivery
//! and media storage locations.

use anyhow::{Context, Result, bail};
use cookie::SameSite;
use std::env;
use std::path::PathBuf;

/// Sentinel a client sends in place of a refresh token to ask the server to
/// read it from the refresh cookie instead.
pub const COOKIE_MODE_PLACEHOLDER: &str = "cookie-mode";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub server_port: u16,
    pub secret_key: String,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub accounts: AccountConfig,
    pub allowed_hosts: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
    pub media_root: PathBuf,
    pub media_url: String,
    pub frontend_url: String,
    pub smtp: Option<SmtpSettings>,
    pub admin: Option<AdminBootstrap>,
}

/// Token lifetimes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub expiration_seconds: i64,
    pub refresh_expiration_seconds: i64,
    /// Lifetime of activation / password reset links.
    pub action_token_expiration_seconds: i64,
}

/// Names and security flags of the two token cookies.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub auth_cookie: String,
    pub refresh_cookie: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub allow_login_not_verified: bool,
    pub send_activation_email: bool,
    pub activation_path: String,
    pub password_reset_path: String,
    pub password_set_path: String,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

/// Email transport settings handed to the email service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub base_url: String,
}

/// Staff account created at startup when all three variables are present.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tau.db?mode=rwc".to_string());

        let max_connections = parse_var("DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_timeout_seconds = parse_var("DB_ACQUIRE_TIMEOUT_SECONDS", 3u64)?;
        let server_port = parse_var("SERVER_PORT", 8000u16)?;

        let secret_key = env::var("SECRET_KEY")
            .context("SECRET_KEY not set")?
            .replace('"', "");
        if secret_key.is_empty() {
            bail!("SECRET_KEY must not be empty");
        }

        let jwt = JwtConfig {
            expiration_seconds: parse_var("JWT_EXPIRATION_MINUTES", 15i64)? * 60,
            refresh_expiration_seconds: parse_var("JWT_REFRESH_EXPIRATION_DAYS", 7i64)?
                * 24
                * 60
                * 60,
            action_token_expiration_seconds: parse_var("ACTION_TOKEN_EXPIRATION_HOURS", 24i64)?
                * 60
                * 60,
        };

        let cookies = CookieConfig {
            auth_cookie: var_or("JWT_AUTH_COOKIE", "tau_auth_token"),
            refresh_cookie: var_or("JWT_AUTH_REFRESH_COOKIE", "tau_refresh_token"),
            http_only: parse_var("JWT_COOKIE_HTTPONLY", true)?,
            secure: parse_var("JWT_COOKIE_SECURE", false)?,
            same_site: parse_same_site(&var_or("JWT_COOKIE_SAMESITE", "Lax"))?,
        };

        let accounts = AccountConfig {
            allow_login_not_verified: parse_var("ALLOW_LOGIN_NOT_VERIFIED", false)?,
            send_activation_email: parse_var("SEND_ACTIVATION_EMAIL", true)?,
            activation_path: var_or("ACTIVATION_PATH_ON_EMAIL", "activate-account"),
            password_reset_path: var_or("PASSWORD_RESET_PATH_ON_EMAIL", "password-reset"),
            password_set_path: var_or("PASSWORD_SET_PATH_ON_EMAIL", "password-set"),
        };

        let allowed_hosts = split_list(&var_or("ALLOWED_HOSTS", "127.0.0.1 localhost"));
        let cors_allowed_origins = split_list(&var_or(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000 http://127.0.0.1:3000 http://localhost:5173",
        ));

        let smtp = match (env::var("EMAIL_HOST_USER"), env::var("EMAIL_HOST_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(SmtpSettings {
                    host: var_or("EMAIL_HOST", "smtp.gmail.com"),
                    port: parse_var("EMAIL_PORT", 587u16)?,
                    from_email: var_or("DEFAULT_FROM_EMAIL", &username),
                    username,
                    password,
                })
            }
            _ => None,
        };

        let admin = match (
            env::var("ADMIN_EMAIL"),
            env::var("ADMIN_USERNAME"),
            env::var("ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(username), Ok(password)) => Some(AdminBootstrap {
                email,
                username,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            server_port,
            secret_key,
            jwt,
            cookies,
            accounts,
            allowed_hosts,
            cors_allowed_origins,
            media_root: PathBuf::from(var_or("MEDIA_ROOT", "media")),
            media_url: normalize_media_url(&var_or("MEDIA_URL", "/media/")),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            smtp,
            admin,
        })
    }

    /// SMTP configuration for the email service, if credentials were provided.
    pub fn email_config(&self) -> Option<EmailConfig> {
        self.smtp.as_ref().map(|smtp| EmailConfig {
            smtp_host: smtp.host.clone(),
            smtp_port: smtp.port,
            smtp_username: smtp.username.clone(),
            smtp_password: smtp.password.clone(),
            from_email: smtp.from_email.clone(),
            from_name: "Tau".to_string(),
            base_url: self.frontend_url.clone(),
        })
    }

    /// Returns `true` when requests for `host` (port stripped) may be served.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        let host = strip_port(host);
        self.allowed_hosts.iter().any(|allowed| {
            allowed == "*"
                || allowed.eq_ignore_ascii_case(host)
                || allowed
                    .strip_prefix('.')
                    .is_some_and(|suffix| host == suffix || host.ends_with(&format!(".{suffix}")))
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid value, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

pub(crate) fn parse_same_site(raw: &str) -> Result<SameSite> {
    match raw.to_ascii_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" => Ok(SameSite::None),
        other => bail!("JWT_COOKIE_SAMESITE must be Lax, Strict or None, got '{other}'"),
    }
}

fn normalize_media_url(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, e.g. [::1]:8000
        return host.split(']').next().map_or(host, |h| &h[1..]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        max_connections: 1,
        acquire_timeout_seconds: 3,
        server_port: 0,
        secret_key: "test-secret-key".to_string(),
        jwt: JwtConfig {
            expiration_seconds: 15 * 60,
            refresh_expiration_seconds: 7 * 24 * 60 * 60,
            action_token_expiration_seconds: 24 * 60 * 60,
        },
        cookies: CookieConfig {
            auth_cookie: "tau_auth_token".to_string(),
            refresh_cookie: "tau_refresh_token".to_string(),
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
        },
        accounts: AccountConfig {
            allow_login_not_verified: false,
            send_activation_email: true,
            activation_path: "activate-account".to_string(),
            password_reset_path: "password-reset".to_string(),
            password_set_path: "password-set".to_string(),
        },
        allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        media_root: std::env::temp_dir().join(format!("tau-media-{}", uuid::Uuid::now_v7())),
        media_url: "/media/".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        smtp: None,
        admin: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_hosts() {
        let mut config = test_config();
        assert!(config.is_host_allowed("localhost:8000"));
        assert!(config.is_host_allowed("127.0.0.1"));
        assert!(!config.is_host_allowed("evil.example.com"));

        config.allowed_hosts = vec![".example.com".to_string()];
        assert!(config.is_host_allowed("api.example.com"));
        assert!(config.is_host_allowed("example.com"));

        config.allowed_hosts = vec!["*".to_string()];
        assert!(config.is_host_allowed("anything:1234"));
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!(parse_same_site("Lax").unwrap(), SameSite::Lax);
        assert_eq!(parse_same_site("STRICT").unwrap(), SameSite::Strict);
        assert_eq!(parse_same_site("none").unwrap(), SameSite::None);
        assert!(parse_same_site("sometimes").is_err());
    }

    #[test]
    fn test_media_url_normalization() {
        assert_eq!(normalize_media_url("/media"), "/media/");
        assert_eq!(normalize_media_url("/media/"), "/media/");
    }
}
