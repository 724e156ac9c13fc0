use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP login; when either credential is missing mail is only logged.
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL objects are served from, `<endpoint>/<bucket>` by default.
    pub public_url: String,
    /// Key prefix shared by every uploaded object.
    pub root_folder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub cors_origin: Option<String>,
    pub frontend_url: String,
    pub backend_url: String,
    /// Marks auth cookies `Secure`.
    pub production: bool,
    pub otp_ttl_minutes: i64,
    /// Legacy OAuth transport: also put the token pair in the redirect URL.
    pub oauth_tokens_in_url: bool,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub google: GoogleConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET")
                .context("ACCESS_TOKEN_SECRET is not set")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")
                .context("REFRESH_TOKEN_SECRET is not set")?,
            issuer: var_or("JWT_ISSUER", "insightbit"),
            audience: var_or("JWT_AUDIENCE", "insightbit-users"),
            access_ttl_secs: parse_expiry(&var_or("ACCESS_TOKEN_EXPIRY", "1h"))
                .context("ACCESS_TOKEN_EXPIRY")?,
            refresh_ttl_secs: parse_expiry(&var_or("REFRESH_TOKEN_EXPIRY", "7d"))
                .context("REFRESH_TOKEN_EXPIRY")?,
        };

        let mail = MailConfig {
            smtp_host: var_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("EMAIL_USER").ok().filter(|v| !v.is_empty()),
            password: std::env::var("EMAIL_PASSWORD").ok().filter(|v| !v.is_empty()),
            from_name: var_or("MAIL_FROM_NAME", "The InsightBit"),
        };

        let endpoint = var_or("STORAGE_ENDPOINT", "http://localhost:9000");
        let bucket = var_or("STORAGE_BUCKET", "insightbit");
        let storage = StorageConfig {
            public_url: std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| {
                format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
            }),
            endpoint,
            bucket,
            access_key: var_or("STORAGE_ACCESS_KEY", "minioadmin"),
            secret_key: var_or("STORAGE_SECRET_KEY", "minioadmin"),
            region: var_or("STORAGE_REGION", "us-east-1"),
            root_folder: var_or("STORAGE_ROOT_FOLDER", "the-insightbit"),
        };

        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
        };

        Ok(Self {
            database_url,
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
            backend_url: var_or("BACKEND_URL", "http://localhost:8000"),
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
            otp_ttl_minutes: std::env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
            oauth_tokens_in_url: std::env::var("OAUTH_TOKENS_IN_URL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            jwt,
            mail,
            storage,
            google,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses token lifetimes written as `45s`, `30m`, `1h`, `7d` or bare seconds.
pub fn parse_expiry(raw: &str) -> anyhow::Result<i64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };
    let n: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid expiry {:?}", raw))?;
    let secs = match unit {
        's' => n,
        'm' => n * 60,
        'h' => n * 60 * 60,
        'd' => n * 60 * 60 * 24,
        other => anyhow::bail!("unknown expiry unit {:?} in {:?}", other, raw),
    };
    anyhow::ensure!(secs > 0, "expiry must be positive: {:?}", raw);
    Ok(secs)
}
