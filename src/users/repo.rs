use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

/// Persistence for user records. Every call goes to the store; nothing is cached.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Matches either column; both inputs must already be lowercase.
    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        user_name: Option<&str>,
    ) -> anyhow::Result<Option<User>>;
    async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Writes the profile fields of `user` back; last write wins. The refresh
    /// token is never written here, and the OTP pair only with `OtpWrite::Replace`.
    async fn update_fields(&self, user: &User, otp: OtpWrite) -> anyhow::Result<User>;
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()>;
}

/// Whether a save also persists `email_verification_otp` and `otp_expiry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpWrite {
    Keep,
    Replace,
}

const USER_COLUMNS: &str = r#"
    id, full_name, user_name, email, password_hash, address, avatar_url, google_id,
    role, refresh_token, is_email_verified, email_verification_otp, otp_expiry,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        user_name: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR user_name = $2 \
             ORDER BY (email = $1) DESC NULLS LAST LIMIT 1"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(user_name)
            .fetch_optional(&self.db)
            .await
            .context("find user by email or username")?;
        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(google_id)
            .fetch_optional(&self.db)
            .await
            .context("find user by google id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (full_name, user_name, email, password_hash, address, avatar_url,
                               google_id, role, is_email_verified, email_verification_otp, otp_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(new.full_name)
            .bind(new.user_name)
            .bind(new.email)
            .bind(new.password_hash)
            .bind(new.address)
            .bind(new.avatar_url)
            .bind(new.google_id)
            .bind(new.role)
            .bind(new.is_email_verified)
            .bind(new.email_verification_otp)
            .bind(new.otp_expiry)
            .fetch_one(&self.db)
            .await
            .context("insert user")?;
        Ok(user)
    }

    async fn update_fields(&self, user: &User, otp: OtpWrite) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET full_name = $2, user_name = $3, email = $4, password_hash = $5,
                   address = $6, avatar_url = $7, google_id = $8, role = $9,
                   is_email_verified = $10,
                   email_verification_otp = CASE WHEN $13::boolean THEN $11::text ELSE email_verification_otp END,
                   otp_expiry = CASE WHEN $13::boolean THEN $12::timestamptz ELSE otp_expiry END,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let saved = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.user_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.address)
            .bind(&user.avatar_url)
            .bind(&user.google_id)
            .bind(user.role)
            .bind(user.is_email_verified)
            .bind(&user.email_verification_otp)
            .bind(user.otp_expiry)
            .bind(otp == OtpWrite::Replace)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("update user {}", user.id))?;
        Ok(saved)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await
            .context("set refresh token")?;
        Ok(())
    }
}
