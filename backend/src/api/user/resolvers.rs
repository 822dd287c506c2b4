//! Identity queries and mutations.
//!
//! Token mutations go through the cookie bridge: issued pairs are written to
//! cookies, and refresh/revoke fall back to the refresh cookie.

use super::models::{
    AccountType, MutationNormalOutput, ObtainJsonWebTokenType, RevokeTokenType, UserNode,
    VerifyTokenType,
};
use crate::api::common::{app_state, request_headers, service_error_to_graphql, set_cookies};
use crate::auth::cookies::CookieBridge;
use crate::auth::guards::{current_user, login_required, staff_required};
use crate::auth::models::TokenPair;
use crate::auth::service::AuthService;
use crate::database::models::{CreateNewUser, UpdateProfile};
use crate::services::user_service::UserService;
use crate::state::AppState;
use async_graphql::{Context, Object, Result};

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The logged-in user, or null.
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<UserNode>> {
        Ok(current_user(ctx).await?.map(UserNode::from))
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Creates an unverified account and emails its activation link.
    async fn register(
        &self,
        ctx: &Context<'_>,
        username: String,
        email: String,
        password: String,
    ) -> Result<AccountType> {
        let state = app_state(ctx)?;
        let user = AuthService::new(state)
            .register(CreateNewUser {
                username,
                email,
                password,
            })
            .await
            .map_err(service_error_to_graphql)?;

        Ok(user.into())
    }

    /// Logs in with an email or username; sets both token cookies.
    async fn token_auth(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<ObtainJsonWebTokenType> {
        let state = app_state(ctx)?;
        let pair = AuthService::new(state)
            .token_auth(&username, &password)
            .await
            .map_err(service_error_to_graphql)?;

        Ok(issue_cookies(ctx, state, pair))
    }

    async fn verify_token(&self, ctx: &Context<'_>, token: String) -> Result<VerifyTokenType> {
        let state = app_state(ctx)?;
        let claims = AuthService::new(state)
            .verify_token(&token)
            .map_err(service_error_to_graphql)?;

        Ok(VerifyTokenType {
            success: true,
            payload: claims.into(),
        })
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// Pass `"cookie-mode"` (or nothing) to use the refresh cookie.
    async fn refresh_token(
        &self,
        ctx: &Context<'_>,
        refresh_token: Option<String>,
        #[graphql(default = false)] revoke_refresh_token: bool,
    ) -> Result<ObtainJsonWebTokenType> {
        let state = app_state(ctx)?;
        let token = CookieBridge::new(&state.config.cookies)
            .resolve_refresh_token(refresh_token.as_deref(), request_headers(ctx));

        let pair = AuthService::new(state)
            .refresh_token(&token, revoke_refresh_token)
            .await
            .map_err(service_error_to_graphql)?;

        Ok(issue_cookies(ctx, state, pair))
    }

    /// Revokes a refresh token; both token cookies are cleared either way.
    async fn revoke_token(
        &self,
        ctx: &Context<'_>,
        refresh_token: Option<String>,
    ) -> Result<RevokeTokenType> {
        let state = app_state(ctx)?;
        let bridge = CookieBridge::new(&state.config.cookies);
        let token = bridge.resolve_refresh_token(refresh_token.as_deref(), request_headers(ctx));

        set_cookies(ctx, bridge.clear_cookies());

        let revoked = AuthService::new(state)
            .revoke_token(&token)
            .await
            .map_err(service_error_to_graphql)?;

        Ok(RevokeTokenType {
            success: true,
            revoked: Some(revoked),
        })
    }

    async fn verify_account(&self, ctx: &Context<'_>, token: String) -> Result<MutationNormalOutput> {
        let state = app_state(ctx)?;
        AuthService::new(state)
            .verify_account(&token)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    async fn resend_activation_email(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> Result<MutationNormalOutput> {
        let state = app_state(ctx)?;
        AuthService::new(state)
            .resend_activation_email(&email)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    async fn update_account(
        &self,
        ctx: &Context<'_>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<MutationNormalOutput> {
        let user = login_required(ctx).await?;
        let state = app_state(ctx)?;
        AuthService::new(state)
            .update_account(
                &user,
                UpdateProfile {
                    first_name,
                    last_name,
                },
            )
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    /// Deactivates the logged-in account and clears its cookies.
    async fn delete_account(&self, ctx: &Context<'_>, password: String) -> Result<MutationNormalOutput> {
        let user = login_required(ctx).await?;
        let state = app_state(ctx)?;
        AuthService::new(state)
            .delete_account(&user, &password)
            .await
            .map_err(service_error_to_graphql)?;

        set_cookies(ctx, CookieBridge::new(&state.config.cookies).clear_cookies());
        Ok(MutationNormalOutput::ok())
    }

    /// Changes the password and issues a fresh pair; older refresh tokens stop working.
    async fn password_change(
        &self,
        ctx: &Context<'_>,
        old_password: String,
        new_password1: String,
        new_password2: String,
    ) -> Result<ObtainJsonWebTokenType> {
        let user = login_required(ctx).await?;
        let state = app_state(ctx)?;
        let pair = AuthService::new(state)
            .password_change(&user, &old_password, &new_password1, &new_password2)
            .await
            .map_err(service_error_to_graphql)?;

        Ok(issue_cookies(ctx, state, pair))
    }

    async fn send_password_reset_email(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> Result<MutationNormalOutput> {
        let state = app_state(ctx)?;
        AuthService::new(state)
            .send_password_reset_email(&email)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    async fn password_reset(
        &self,
        ctx: &Context<'_>,
        token: String,
        new_password1: String,
        new_password2: String,
    ) -> Result<MutationNormalOutput> {
        let state = app_state(ctx)?;
        AuthService::new(state)
            .password_reset(&token, &new_password1, &new_password2)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    async fn password_set(
        &self,
        ctx: &Context<'_>,
        token: String,
        new_password1: String,
        new_password2: String,
    ) -> Result<MutationNormalOutput> {
        let state = app_state(ctx)?;
        AuthService::new(state)
            .password_set(&token, &new_password1, &new_password2)
            .await
            .map_err(service_error_to_graphql)?;
        Ok(MutationNormalOutput::ok())
    }

    /// Removes every user. Staff only.
    async fn delete_all_users(&self, ctx: &Context<'_>) -> Result<String> {
        staff_required(ctx).await?;
        let state = app_state(ctx)?;
        let count = UserService::new(&state.pool)
            .delete_all_users()
            .await
            .map_err(service_error_to_graphql)?;

        Ok(format!("Deleted {count} users"))
    }
}

fn issue_cookies(ctx: &Context<'_>, state: &AppState, pair: TokenPair) -> ObtainJsonWebTokenType {
    let cookies = CookieBridge::new(&state.config.cookies).token_cookies(
        &pair,
        state.jwt.access_token_lifetime(),
        state.jwt.refresh_token_lifetime(),
    );
    set_cookies(ctx, cookies);
    pair.into()
}
