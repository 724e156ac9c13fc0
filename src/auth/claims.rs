use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload; both token kinds carry the same identity claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,                 // user ID
    pub email: String,
    pub user_name: Option<String>,
    pub full_name: Option<String>,
    pub iat: usize,                // issued at (unix timestamp)
    pub exp: usize,                // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
    pub jti: Uuid,                 // makes every issued token distinct
    pub kind: TokenKind,
}
