use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{
    repo::find_session_user,
    repo_types::User,
    services::{hash_token, read_cookie},
};
use crate::{error::AppError, state::AppState};

/// Resolves the session cookie to a signed-in user.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, &state.config.session.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let user = find_session_user(&state.db, &hash_token(&token))
            .await?
            .ok_or_else(|| {
                warn!("unknown or expired session");
                AppError::Unauthorized
            })?;

        Ok(AuthUser(user))
    }
}

/// A signed-in user with the admin flag.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(user_id = %user.id, "admin route refused");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
