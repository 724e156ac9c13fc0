use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password;

/// Account role; stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub user_name: Option<String>, // unset while registration is OTP-pending
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Argon2; absent for Google-only accounts
    pub address: Option<String>,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Fails closed: an account without a password never matches.
    pub fn verify_password(&self, plain: &str) -> anyhow::Result<bool> {
        match &self.password_hash {
            Some(hash) => password::verify_password(plain, hash),
            None => Ok(false),
        }
    }
}

/// Fields for a fresh row; everything else takes the column default.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub full_name: Option<String>,
    pub user_name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    pub email_verification_otp: Option<String>,
    pub otp_expiry: Option<OffsetDateTime>,
}

/// What clients may see of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub user_name: Option<String>,
    pub email: String,
    pub address: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            user_name: u.user_name.clone(),
            email: u.email.clone(),
            address: u.address.clone(),
            avatar: u.avatar_url.clone(),
            role: u.role,
            is_email_verified: u.is_email_verified,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
