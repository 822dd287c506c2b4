//! Shared application state handed to every GraphQL request.

use crate::config::Config;
use crate::services::email_service::EmailService;
use crate::services::media_service::MediaService;
use crate::utils::jwt::JwtUtils;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub jwt: JwtUtils,
    pub email: EmailService,
    pub media: MediaService,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        let email = EmailService::new(&config);
        let media = MediaService::new(&config);
        Self::with_services(config, pool, email, media)
    }

    pub fn with_services(
        config: Config,
        pool: SqlitePool,
        email: EmailService,
        media: MediaService,
    ) -> Self {
        let jwt = JwtUtils::new(&config.secret_key, config.jwt.clone());
        Self {
            config: Arc::new(config),
            pool,
            jwt,
            email,
            media,
        }
    }
}
