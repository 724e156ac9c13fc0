use tracing::{info, instrument, warn};

use super::{
    dto::{RegisterRequest, UpdateAccountRequest},
    repo::OtpWrite,
    repo_types::{NewUser, Role, User},
};
use crate::{
    auth::{
        password::{hash_password, require_password},
        services::{is_valid_email, normalize, required},
    },
    error::{ApiError, ApiResult},
    media::{self, UploadItem},
    state::AppState,
};

/// Direct sign-up without an OTP round trip. The account starts unverified.
#[instrument(skip(st, req))]
pub async fn register(st: &AppState, req: RegisterRequest) -> ApiResult<User> {
    const MISSING: &str = "All fields are required!";
    let full_name = required(&req.full_name, MISSING)?.to_string();
    let user_name = normalize(required(&req.user_name, MISSING)?);
    let email = normalize(required(&req.email, MISSING)?);
    let address = required(&req.address, MISSING)?.to_string();
    let password = require_password(req.password.as_deref(), "Password")?;

    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    if let Some(existing) = st
        .users
        .find_by_email_or_username(Some(&email), Some(&user_name))
        .await?
    {
        let field = if existing.email == email { "email" } else { "username" };
        warn!(field, "registration conflict");
        return Err(ApiError::conflict(format!("User already exists with {}", field)));
    }

    let user = st
        .users
        .create(NewUser {
            full_name: Some(full_name),
            user_name: Some(user_name),
            email,
            password_hash: Some(hash_password(password)?),
            address: Some(address),
            role: Role::User,
            ..NewUser::default()
        })
        .await?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

#[instrument(skip(st, user, req), fields(user_id = %user.id))]
pub async fn update_account(st: &AppState, mut user: User, req: UpdateAccountRequest) -> ApiResult<User> {
    let full_name = req.full_name.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let email = req.email.as_deref().map(normalize).filter(|v| !v.is_empty());
    if full_name.is_none() && email.is_none() {
        return Err(ApiError::validation("Full name or email is required"));
    }

    if let Some(email) = email {
        if !is_valid_email(&email) {
            return Err(ApiError::validation("Invalid email"));
        }
        if email != user.email {
            if let Some(other) = st.users.find_by_email(&email).await? {
                if other.id != user.id {
                    return Err(ApiError::conflict("Email is already in use"));
                }
            }
            user.email = email;
        }
    }
    if let Some(name) = full_name {
        user.full_name = Some(name.to_string());
    }

    let user = st.users.update_fields(&user, OtpWrite::Keep).await?;
    info!("account details updated");
    Ok(user)
}

/// Stores the new avatar, then drops the previous object if this bucket owns it.
#[instrument(skip(st, user, item), fields(user_id = %user.id))]
pub async fn update_avatar(st: &AppState, mut user: User, item: Option<UploadItem>) -> ApiResult<User> {
    let item = item.ok_or_else(|| ApiError::validation("Avatar file is missing"))?;
    if !item.content_type.starts_with("image/") {
        return Err(ApiError::validation("Avatar must be an image"));
    }

    let stored = media::services::upload_media(st, "avatars", item).await?;
    let previous = user.avatar_url.replace(stored.url);
    let user = st.users.update_fields(&user, OtpWrite::Keep).await?;

    if let Some(old) = previous {
        media::services::remove_media(st, &old).await;
    }
    info!("avatar updated");
    Ok(user)
}
