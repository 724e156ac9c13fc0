use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::jwt::TokenPair;
use crate::config::AppConfig;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const OAUTH_STATE_COOKIE: &str = "oauthState";

fn auth_cookie(cfg: &AppConfig, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(cfg.production)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

pub fn with_tokens(jar: CookieJar, cfg: &AppConfig, pair: &TokenPair) -> CookieJar {
    jar.add(auth_cookie(cfg, ACCESS_COOKIE, pair.access_token.clone()))
        .add(auth_cookie(cfg, REFRESH_COOKIE, pair.refresh_token.clone()))
}

pub fn without_tokens(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// CSRF state for the Google round trip. `Lax` so it survives the
/// cross-site redirect back from the provider.
pub fn oauth_state(cfg: &AppConfig, state: String) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state))
        .http_only(true)
        .secure(cfg.production)
        .same_site(SameSite::Lax)
        .path("/api/v1/auth")
        .max_age(Duration::minutes(10))
        .build()
}

pub fn clear_oauth_state(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path("/api/v1/auth"))
}
