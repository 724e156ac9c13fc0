use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState, users::repo_types::User};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is invalid or expired")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("expected a {0:?} token")]
    WrongKind(TokenKind),
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Access and refresh tokens are signed with independent secrets.
#[derive(Clone)]
pub struct JwtKeys {
    access: KeyPair,
    refresh: KeyPair,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            access: KeyPair::from_secret(&cfg.access_secret),
            refresh: KeyPair::from_secret(&cfg.refresh_secret),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::seconds(cfg.access_ttl_secs),
            refresh_ttl: Duration::seconds(cfg.refresh_ttl_secs),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn claims_for(&self, user: &User, kind: TokenKind, now: OffsetDateTime) -> Claims {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        Claims {
            sub: user.id,
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            full_name: user.full_name.clone(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind,
        }
    }

    fn encode_claims(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.keys(claims.kind).encoding)?;
        debug!(user_id = %claims.sub, kind = ?claims.kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let claims = self.claims_for(user, TokenKind::Access, OffsetDateTime::now_utc());
        self.encode_claims(&claims)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        let claims = self.claims_for(user, TokenKind::Refresh, OffsetDateTime::now_utc());
        self.encode_claims(&claims)
    }

    pub fn issue_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign_access(user)?,
            refresh_token: self.sign_refresh(user)?,
        })
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation)?;
        if data.claims.kind != kind {
            return Err(TokenError::WrongKind(kind));
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenKind::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn make_keys(access_secret: &str, refresh_secret: &str, issuer: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            issuer: issuer.into(),
            audience: "test-aud".into(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
        })
    }

    #[test]
    fn access_token_carries_identity_claims() {
        let keys = make_keys("access", "refresh", "test-issuer");
        let user = testing::sample_user("alice", "a@x.com");
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.user_name.as_deref(), Some("alice"));
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn refresh_token_verifies_only_with_refresh_secret() {
        let keys = make_keys("access", "refresh", "iss");
        let user = testing::sample_user("bob", "b@x.com");
        let pair = keys.issue_pair(&user).unwrap();

        let claims = keys.verify_refresh(&pair.refresh_token).expect("verify refresh");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);

        // A refresh token presented as an access token fails the signature check.
        assert!(matches!(
            keys.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid(_))
        ));
        assert!(keys.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn shared_secret_still_enforces_kind() {
        let keys = make_keys("same", "same", "iss");
        let user = testing::sample_user("carol", "c@x.com");
        let access = keys.sign_access(&user).unwrap();
        assert!(matches!(
            keys.verify_refresh(&access),
            Err(TokenError::WrongKind(TokenKind::Refresh))
        ));
    }

    #[test]
    fn pairs_issued_back_to_back_differ() {
        let keys = make_keys("access", "refresh", "iss");
        let user = testing::sample_user("dave", "d@x.com");
        let first = keys.issue_pair(&user).unwrap();
        let second = keys.issue_pair(&user).unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let good = make_keys("secret", "refresh", "good-iss");
        let bad = make_keys("secret", "refresh", "bad-iss");
        let user = testing::sample_user("erin", "e@x.com");
        let token = good.sign_access(&user).unwrap();
        assert!(bad.verify_access(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("access", "refresh", "iss");
        let user = testing::sample_user("frank", "f@x.com");
        let issued = OffsetDateTime::now_utc() - Duration::hours(3);
        let claims = keys.claims_for(&user, TokenKind::Access, issued);
        let token = keys.encode_claims(&claims).unwrap();
        assert!(matches!(keys.verify_access(&token), Err(TokenError::Invalid(_))));
    }
}
