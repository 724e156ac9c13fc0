use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{patch, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use super::{
    dto::{RegisterRequest, UpdateAccountRequest},
    repo_types::PublicUser,
    services,
};
use crate::{
    auth::{
        cookies,
        dto::{AuthResponse, ChangePasswordRequest, LoginRequest, RefreshRequest},
        services as auth_services, AuthUser,
    },
    error::{ApiResponse, ApiResult, AppJson},
    media::services::single_file,
    state::AppState,
};

const AVATAR_LIMIT: usize = 10 * 1024 * 1024;

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-Token", post(refresh_token))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", post(current_user))
        .route("/users/update-account", patch(update_account))
        .route(
            "/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(AVATAR_LIMIT)),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = services::register(&state, payload).await?;
    Ok(ApiResponse::created(
        PublicUser::from(&user),
        "User registered successfully",
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<AuthResponse>)> {
    let session = auth_services::login(&state, payload).await?;
    let jar = cookies::with_tokens(jar, &state.config, &session.tokens);
    Ok((
        jar,
        ApiResponse::ok(AuthResponse::from(session), "User logged in successfully"),
    ))
}

#[instrument(skip(state, jar, user))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user): AuthUser,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    auth_services::logout(&state, &user).await?;
    Ok((
        cookies::without_tokens(jar),
        ApiResponse::message("User logged out successfully"),
    ))
}

/// Body is optional; the cookie wins when both are present.
#[instrument(skip(state, jar, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<AppJson<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<AuthResponse>)> {
    let token = jar
        .get(cookies::REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| payload.and_then(|AppJson(body)| body.refresh_token));

    let session = auth_services::refresh(&state, token).await?;
    let jar = cookies::with_tokens(jar, &state.config, &session.tokens);
    Ok((
        jar,
        ApiResponse::ok(AuthResponse::from(session), "Access token refreshed"),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    auth_services::change_password(&state, user, payload).await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

#[instrument(skip(user))]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::ok(
        PublicUser::from(&user),
        "Current user fetched successfully",
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = services::update_account(&state, user, payload).await?;
    Ok(ApiResponse::ok(
        PublicUser::from(&user),
        "Account details updated successfully",
    ))
}

#[instrument(skip(state, user, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let file = single_file(mp, "avatar").await?;
    let user = services::update_avatar(&state, user, file).await?;
    Ok(ApiResponse::ok(
        PublicUser::from(&user),
        "Avatar updated successfully",
    ))
}
