use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::{cookies::ACCESS_COOKIE, jwt::JwtKeys, roles::authorize};
use crate::{
    error::ApiError,
    state::AppState,
    users::repo_types::{Role, User},
};

/// The authenticated caller, loaded fresh from the store.
pub struct AuthUser(pub User);

/// An authenticated caller holding the admin role.
pub struct AdminUser(pub User);

/// Cookie first, then `Authorization: Bearer`.
pub(crate) fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(c) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthenticated("Access token is missing"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::unauthenticated("Access token is invalid or expired")
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthenticated("Access token is invalid"))?;

        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        authorize(&user, Role::Admin)?;
        Ok(AdminUser(user))
    }
}
