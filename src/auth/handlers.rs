use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use rand::{distributions::Alphanumeric, Rng};
use tracing::{error, info, instrument, warn};
use url::Url;

use super::{
    cookies,
    dto::{
        AuthResponse, ForgotPasswordRequest, OAuthCallbackQuery, ResetPasswordRequest,
        SendOtpRequest, VerifyOtpRequest,
    },
    services::{self, Session},
};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResponse, ApiResult, AppJson},
    state::AppState,
    users::repo_types::PublicUser,
};

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/verification/send-otp", post(send_otp))
        .route("/verification/verify-otp", post(verify_otp))
        .route("/verification/forgot-password", post(forgot_password))
        .route("/verification/reset-password", post(reset_password))
}

pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

impl From<Session> for AuthResponse {
    fn from(s: Session) -> Self {
        Self {
            user: PublicUser::from(&s.user),
            tokens: s.tokens,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SendOtpRequest>,
) -> ApiResult<ApiResponse<()>> {
    services::send_registration_otp(&state, payload).await?;
    Ok(ApiResponse::message("OTP sent to your email"))
}

#[instrument(skip(state, jar, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> ApiResult<(CookieJar, ApiResponse<AuthResponse>)> {
    let session = services::verify_otp_and_register(&state, payload).await?;
    let jar = cookies::with_tokens(jar, &state.config, &session.tokens);
    Ok((
        jar,
        ApiResponse::created(AuthResponse::from(session), "User registered successfully"),
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    services::send_forgot_password_otp(&state, payload).await?;
    Ok(ApiResponse::message("Password reset OTP sent to your email"))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    services::reset_password(&state, payload).await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

fn found(jar: CookieJar, location: String) -> Response {
    (StatusCode::FOUND, jar, [(LOCATION, location)]).into_response()
}

fn frontend_url(cfg: &AppConfig, path: &str) -> anyhow::Result<Url> {
    let base = format!("{}/", cfg.frontend_url.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(path)?)
}

fn failure_redirect(cfg: &AppConfig, jar: CookieJar) -> Response {
    let location = frontend_url(cfg, "login")
        .map(|mut url| {
            url.query_pairs_mut().append_pair("error", "auth_failed");
            url.to_string()
        })
        .unwrap_or_else(|_| "/".to_string());
    found(cookies::clear_oauth_state(jar), location)
}

/// Where the browser lands after a successful sign-in. Tokens travel in the
/// cookies; the query carries them too only when explicitly enabled.
pub(crate) fn success_location(cfg: &AppConfig, session: &Session) -> anyhow::Result<String> {
    let mut url = frontend_url(cfg, "oauth-success")?;
    let user = serde_json::to_string(&PublicUser::from(&session.user))?;
    {
        let mut query = url.query_pairs_mut();
        if cfg.oauth_tokens_in_url {
            query
                .append_pair("accessToken", &session.tokens.access_token)
                .append_pair("refreshToken", &session.tokens.refresh_token);
        }
        query.append_pair("user", &user);
    }
    Ok(url.to_string())
}

#[instrument(skip(state, jar))]
pub async fn google_start(State(state): State<AppState>, jar: CookieJar) -> Response {
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    match state.identity.authorize_url(&csrf) {
        Ok(location) => found(jar.add(cookies::oauth_state(&state.config, csrf)), location),
        Err(e) => {
            error!(error = %e, "google sign-in unavailable");
            failure_redirect(&state.config, jar)
        }
    }
}

#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let expected = jar
        .get(cookies::OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string());

    if let Some(reason) = query.error.as_deref() {
        warn!(reason, "provider denied sign-in");
        return failure_redirect(&state.config, jar);
    }
    if expected.is_none() || expected != query.state {
        warn!("oauth state mismatch");
        return failure_redirect(&state.config, jar);
    }
    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        warn!("oauth callback without code");
        return failure_redirect(&state.config, jar);
    };

    let session = match state.identity.exchange_code(code).await {
        Ok(profile) => services::oauth_login(&state, profile).await,
        Err(e) => Err(ApiError::upstream("Google sign-in failed", e)),
    };
    let session = match session {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "google sign-in failed");
            return failure_redirect(&state.config, jar);
        }
    };

    match success_location(&state.config, &session) {
        Ok(location) => {
            info!(user_id = %session.user.id, "google sign-in completed");
            let jar = cookies::with_tokens(
                cookies::clear_oauth_state(jar),
                &state.config,
                &session.tokens,
            );
            found(jar, location)
        }
        Err(e) => {
            error!(error = %e, "building oauth redirect failed");
            failure_redirect(&state.config, jar)
        }
    }
}
