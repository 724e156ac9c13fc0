//! Registration, login and session lifecycle.

use axum::extract::FromRef;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest,
        SendOtpRequest, VerifyOtpRequest,
    },
    jwt::{JwtKeys, TokenPair},
    mailer::OtpPurpose,
    oauth::OAuthProfile,
    otp,
    password::{hash_password, require_password},
};
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        repo::OtpWrite,
        repo_types::{NewUser, Role, User},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lowercase form used for emails and usernames.
pub(crate) fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Non-blank value of an optional field, trimmed.
pub(crate) fn required<'a>(value: &'a Option<String>, message: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

pub(crate) fn required_email(value: &Option<String>) -> ApiResult<String> {
    let email = normalize(required(value, "Email is required")?);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    Ok(email)
}

/// A user together with the token pair just issued for them.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Issues a pair and stores its refresh token, replacing any earlier one.
async fn start_session(st: &AppState, mut user: User) -> ApiResult<Session> {
    let keys = JwtKeys::from_ref(st);
    let tokens = keys.issue_pair(&user)?;
    st.users
        .set_refresh_token(user.id, Some(&tokens.refresh_token))
        .await?;
    user.refresh_token = Some(tokens.refresh_token.clone());
    Ok(Session { user, tokens })
}

#[instrument(skip(st, req))]
pub async fn send_registration_otp(st: &AppState, req: SendOtpRequest) -> ApiResult<()> {
    let email = required_email(&req.email)?;
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let user = match st.users.find_by_email(&email).await? {
        Some(u) if u.is_email_verified => {
            warn!(email = %email, "registration otp for verified email");
            return Err(ApiError::AlreadyRegistered);
        }
        Some(mut pending) => {
            if pending.full_name.is_none() {
                pending.full_name = full_name;
            }
            pending
        }
        None => {
            st.users
                .create(NewUser {
                    email: email.clone(),
                    full_name,
                    ..NewUser::default()
                })
                .await?
        }
    };

    otp::issue(st, user, OtpPurpose::Registration).await?;
    Ok(())
}

#[instrument(skip(st, req))]
pub async fn verify_otp_and_register(st: &AppState, req: VerifyOtpRequest) -> ApiResult<Session> {
    let email = normalize(required(&req.email, "Email and OTP are required")?);
    let code = required(&req.otp, "Email and OTP are required")?;
    let password = require_password(req.password.as_deref(), "Password")?;
    let user_name = normalize(required(&req.user_name, "Username is required")?);

    let mut user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found. Please request OTP again."))?;

    if user.is_email_verified {
        return Err(ApiError::conflict("Email already registered"));
    }

    otp::consume(&mut user, code, OffsetDateTime::now_utc())?;

    if let Some(other) = st
        .users
        .find_by_email_or_username(None, Some(&user_name))
        .await?
    {
        if other.id != user.id {
            return Err(ApiError::conflict("Username is already taken"));
        }
    }

    user.password_hash = Some(hash_password(password)?);
    user.user_name = Some(user_name);
    user.address = req.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    user.is_email_verified = true;
    let user = st.users.update_fields(&user, OtpWrite::Replace).await?;

    info!(user_id = %user.id, "registration completed");
    start_session(st, user).await
}

#[instrument(skip(st, req))]
pub async fn send_forgot_password_otp(st: &AppState, req: ForgotPasswordRequest) -> ApiResult<()> {
    let email = required_email(&req.email)?;
    let user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !user.is_email_verified {
        return Err(ApiError::validation("Email not verified"));
    }

    otp::issue(st, user, OtpPurpose::PasswordReset).await?;
    Ok(())
}

#[instrument(skip(st, req))]
pub async fn reset_password(st: &AppState, req: ResetPasswordRequest) -> ApiResult<()> {
    let email = normalize(required(&req.email, "All fields are required")?);
    let code = required(&req.otp, "All fields are required")?;
    let new_password = require_password(req.new_password.as_deref(), "New password")?;

    let mut user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    otp::consume(&mut user, code, OffsetDateTime::now_utc())?;
    user.password_hash = Some(hash_password(new_password)?);
    st.users.update_fields(&user, OtpWrite::Replace).await?;

    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[instrument(skip(st, req))]
pub async fn login(st: &AppState, req: LoginRequest) -> ApiResult<Session> {
    let email = req.email.as_deref().map(normalize).filter(|e| !e.is_empty());
    let user_name = req.user_name.as_deref().map(normalize).filter(|u| !u.is_empty());
    if email.is_none() && user_name.is_none() {
        return Err(ApiError::validation("Email or username is required for login."));
    }
    let password = require_password(req.password.as_deref(), "Password")?;

    let user = st
        .users
        .find_by_email_or_username(email.as_deref(), user_name.as_deref())
        .await?
        .ok_or_else(|| {
            ApiError::not_found("User not found with the provided email or username.")
        })?;

    if !user.verify_password(password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthenticated("Incorrect password."));
    }

    info!(user_id = %user.id, "user logged in");
    start_session(st, user).await
}

/// Forgets the stored refresh token. Access tokens stay valid until they expire.
#[instrument(skip(st, user), fields(user_id = %user.id))]
pub async fn logout(st: &AppState, user: &User) -> ApiResult<()> {
    st.users.set_refresh_token(user.id, None).await?;
    info!("user logged out");
    Ok(())
}

#[instrument(skip(st, token))]
pub async fn refresh(st: &AppState, token: Option<String>) -> ApiResult<Session> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("Refresh token is required"))?;
    let invalid = || ApiError::unauthenticated("Invalid or expired refresh token.");

    let claims = JwtKeys::from_ref(st).verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        invalid()
    })?;

    let user = st.users.find_by_id(claims.sub).await?.ok_or_else(invalid)?;
    if user.refresh_token.as_deref() != Some(token.as_str()) {
        warn!(user_id = %user.id, "refresh token does not match stored token");
        return Err(invalid());
    }

    start_session(st, user).await
}

#[instrument(skip(st, user, req), fields(user_id = %user.id))]
pub async fn change_password(st: &AppState, mut user: User, req: ChangePasswordRequest) -> ApiResult<()> {
    let old = require_password(req.old_password.as_deref(), "Old password")?;
    let new = require_password(req.new_password.as_deref(), "New password")?;

    if !user.verify_password(old)? {
        return Err(ApiError::unauthenticated("Invalid old password"));
    }

    user.password_hash = Some(hash_password(new)?);
    st.users.update_fields(&user, OtpWrite::Keep).await?;
    info!("password changed");
    Ok(())
}

/// Signs in through the identity provider: match by provider id, then by
/// email, otherwise create a verified account.
#[instrument(skip(st, profile), fields(provider_id = %profile.provider_id))]
pub async fn oauth_login(st: &AppState, profile: OAuthProfile) -> ApiResult<Session> {
    let email = normalize(&profile.email);

    let existing = match st.users.find_by_google_id(&profile.provider_id).await? {
        Some(u) => Some(u),
        None => st.users.find_by_email(&email).await?,
    };

    let user = match existing {
        Some(mut user) => {
            if user.google_id.is_none() || !user.is_email_verified {
                user.google_id = Some(profile.provider_id.clone());
                // The provider vouches for the address, which ends any pending registration.
                user.is_email_verified = true;
                user.email_verification_otp = None;
                user.otp_expiry = None;
                if user.avatar_url.is_none() {
                    user.avatar_url = profile.avatar_url.clone();
                }
                if user.full_name.is_none() {
                    user.full_name = profile.display_name.clone();
                }
                user = st.users.update_fields(&user, OtpWrite::Replace).await?;
            }
            user
        }
        None => {
            let user_name = unused_user_name(st, profile.display_name.as_deref()).await?;
            let user = st
                .users
                .create(NewUser {
                    full_name: profile.display_name.clone(),
                    user_name: Some(user_name),
                    email,
                    avatar_url: profile.avatar_url.clone(),
                    google_id: Some(profile.provider_id.clone()),
                    role: Role::User,
                    is_email_verified: true,
                    ..NewUser::default()
                })
                .await?;
            info!(user_id = %user.id, "account created from google profile");
            user
        }
    };

    start_session(st, user).await
}

pub(crate) fn user_name_candidate(display_name: Option<&str>) -> String {
    let base: String = display_name
        .unwrap_or("user")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    let base = if base.is_empty() { "user".to_string() } else { base };
    format!("{}{}", base, rand::thread_rng().gen_range(0..1000))
}

async fn unused_user_name(st: &AppState, display_name: Option<&str>) -> ApiResult<String> {
    for _ in 0..5 {
        let candidate = user_name_candidate(display_name);
        if st
            .users
            .find_by_email_or_username(None, Some(&candidate))
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
    }
    // Fall back to a suffix wide enough not to collide.
    Ok(format!(
        "{}{}",
        user_name_candidate(display_name),
        uuid::Uuid::new_v4().simple()
    ))
}
