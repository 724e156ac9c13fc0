//! Google sign-in (authorization-code flow).

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use url::Url;

use crate::config::AppConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to; `state` comes back on the callback.
    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;
    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile>;
}

pub struct GoogleOAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: String,
    http: HttpClient,
}

impl GoogleOAuth {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            client_id: cfg.google.client_id.clone(),
            client_secret: cfg.google.client_secret.clone(),
            redirect_url: format!(
                "{}/api/v1/auth/google/callback",
                cfg.backend_url.trim_end_matches('/')
            ),
            http: HttpClient::new(),
        }
    }

    fn credentials(&self) -> anyhow::Result<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => anyhow::bail!("Google client credentials are not configured"),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let (client_id, _) = self.credentials()?;
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "profile email"),
                ("state", state),
            ],
        )?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        #[derive(Deserialize)]
        struct GoogleUser {
            id: String,
            email: Option<String>,
            name: Option<String>,
            picture: Option<String>,
        }

        let (client_id, client_secret) = self.credentials()?;
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request")?
            .error_for_status()
            .context("google token exchange")?
            .json()
            .await
            .context("parse google token response")?;

        let user: GoogleUser = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request")?
            .error_for_status()
            .context("google userinfo")?
            .json()
            .await
            .context("parse google userinfo")?;

        Ok(OAuthProfile {
            provider_id: user.id,
            email: user.email.context("google account has no email")?,
            display_name: user.name,
            avatar_url: user.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google(client_id: Option<&str>) -> GoogleOAuth {
        GoogleOAuth {
            client_id: client_id.map(str::to_string),
            client_secret: client_id.map(|_| "secret".to_string()),
            redirect_url: "http://localhost:8000/api/v1/auth/google/callback".into(),
            http: HttpClient::new(),
        }
    }

    #[test]
    fn authorize_url_carries_state_and_scopes() {
        let url = google(Some("cid")).authorize_url("xyz").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(params.contains(&("client_id".into(), "cid".into())));
        assert!(params.contains(&("state".into(), "xyz".into())));
        assert!(params.contains(&("scope".into(), "profile email".into())));
    }

    #[test]
    fn unconfigured_provider_refuses() {
        assert!(google(None).authorize_url("xyz").is_err());
    }
}
