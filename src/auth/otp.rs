//! One-time codes proving email ownership.
//!
//! The code and its expiry live on the user row. Issuing overwrites whatever
//! was there; consuming clears both, so a code works at most once.

use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};

use super::mailer::OtpPurpose;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::{repo::OtpWrite, repo_types::User},
};

/// Six-digit numeric code. Collisions between users are not checked.
pub fn generate() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Writes a fresh code and expiry onto `user` (in memory only).
pub fn assign(user: &mut User, code: String, ttl: Duration, now: OffsetDateTime) {
    user.email_verification_otp = Some(code);
    user.otp_expiry = Some(now + ttl);
}

/// Checks `supplied` against the stored code and clears it on success.
///
/// Expiry is checked before the code itself, so a correct but stale code
/// reports `OtpExpired`.
pub fn consume(user: &mut User, supplied: &str, now: OffsetDateTime) -> ApiResult<()> {
    if matches!(user.otp_expiry, Some(expiry) if now > expiry) {
        return Err(ApiError::OtpExpired);
    }
    match user.email_verification_otp.as_deref() {
        Some(code) if code == supplied.trim() => {
            user.email_verification_otp = None;
            user.otp_expiry = None;
            Ok(())
        }
        _ => Err(ApiError::OtpMismatch),
    }
}

/// Stores a new code on the user and mails it.
///
/// The record is saved before delivery; a failed send leaves the new code in
/// place and surfaces as an upstream error.
#[instrument(skip(st, user), fields(user_id = %user.id))]
pub async fn issue(st: &AppState, mut user: User, purpose: OtpPurpose) -> ApiResult<User> {
    let code = generate();
    let ttl = Duration::minutes(st.config.otp_ttl_minutes);
    assign(&mut user, code.clone(), ttl, OffsetDateTime::now_utc());
    let user = st.users.update_fields(&user, OtpWrite::Replace).await?;

    st.mailer
        .send_otp(&user.email, user.full_name.as_deref(), &code, purpose)
        .await
        .map_err(|e| ApiError::upstream("Failed to send OTP email", e))?;

    info!(?purpose, "otp issued");
    Ok(user)
}
