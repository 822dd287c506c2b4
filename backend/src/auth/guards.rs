//! Access checks run at the top of protected resolvers.

use crate::api::common::{app_state, service_error_to_graphql};
use crate::auth::models::Viewer;
use crate::auth::service::AuthService;
use crate::database::models::User;
use crate::errors::ServiceError;
use async_graphql::{Context, Result};

/// The active user behind the request's access token, if any.
pub async fn current_user(ctx: &Context<'_>) -> Result<Option<User>> {
    let Some(claims) = ctx.data_opt::<Viewer>().and_then(|viewer| viewer.claims.as_ref()) else {
        return Ok(None);
    };

    let state = app_state(ctx)?;
    AuthService::new(state)
        .current_user(claims)
        .await
        .map_err(service_error_to_graphql)
}

/// Fails with `UNAUTHENTICATED` unless a user is logged in.
pub async fn login_required(ctx: &Context<'_>) -> Result<User> {
    current_user(ctx).await?.ok_or_else(|| {
        service_error_to_graphql(ServiceError::unauthenticated(
            "You do not have permission to perform this action",
        ))
    })
}

/// Fails with `PERMISSION_DENIED` unless the logged-in user is staff.
pub async fn staff_required(ctx: &Context<'_>) -> Result<User> {
    let user = login_required(ctx).await?;
    if !user.is_staff {
        tracing::warn!("User {} attempted a staff-only operation", user.id);
        return Err(service_error_to_graphql(ServiceError::permission_denied(
            "Staff privileges required",
        )));
    }
    Ok(user)
}
