use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookies;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod mailer;
pub mod oauth;
pub mod otp;
pub mod password;
pub mod roles;
pub mod services;

pub use extractors::{AdminUser, AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::verification_routes())
        .merge(handlers::oauth_routes())
}
