//! Outgoing mail for one-time codes.

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, MailConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        to: &str,
        full_name: Option<&str>,
        code: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<()>;
}

/// Picks SMTP when credentials are configured. Outside production a missing
/// login falls back to `LogMailer`; in production it is a startup error.
pub fn from_config(cfg: &AppConfig) -> anyhow::Result<std::sync::Arc<dyn Mailer>> {
    let mail = &cfg.mail;
    match (&mail.username, &mail.password) {
        (Some(user), Some(pass)) => Ok(std::sync::Arc::new(SmtpMailer::new(
            mail,
            user,
            pass,
            cfg.otp_ttl_minutes,
        )?)),
        _ if cfg.production => {
            anyhow::bail!("EMAIL_USER and EMAIL_PASSWORD are required when APP_ENV=production")
        }
        _ => {
            warn!("EMAIL_USER/EMAIL_PASSWORD not set; OTP mail will only be logged");
            Ok(std::sync::Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    otp_ttl_minutes: i64,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig, user: &str, pass: &str, otp_ttl_minutes: i64) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .context("smtp relay")?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();
        let from = format!("{} <{}>", cfg.from_name, user)
            .parse::<Mailbox>()
            .context("parse sender address")?;
        Ok(Self {
            from,
            transport,
            otp_ttl_minutes,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(
        &self,
        to: &str,
        full_name: Option<&str>,
        code: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("parse recipient address")?)
            .subject(subject(purpose))
            .header(ContentType::TEXT_HTML)
            .body(render_otp_html(full_name, code, purpose, self.otp_ttl_minutes))
            .context("build otp message")?;

        let response = self.transport.send(message).await.context("smtp send")?;
        info!(to, code = %response.code(), "otp email sent");
        Ok(())
    }
}

/// Development fallback; delivery is skipped.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(
        &self,
        to: &str,
        _full_name: Option<&str>,
        code: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<()> {
        info!(to, ?purpose, "mail delivery disabled; otp not sent");
        debug!(to, code, "otp");
        Ok(())
    }
}

fn subject(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Registration => "Verify Your Email - OTP Code",
        OtpPurpose::PasswordReset => "Reset Your Password - OTP Code",
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `full_name` comes from the client and is escaped; `code` is always digits.
pub(crate) fn render_otp_html(
    full_name: Option<&str>,
    code: &str,
    purpose: OtpPurpose,
    ttl_minutes: i64,
) -> String {
    let (title, intro) = match purpose {
        OtpPurpose::Registration => (
            "Email Verification",
            "Thank you for registering with <strong>The InsightBit</strong>! \
             To complete your registration, please verify your email address using the OTP below:",
        ),
        OtpPurpose::PasswordReset => (
            "Password Reset",
            "We received a request to reset your password. Use the OTP below to choose a new one:",
        ),
    };
    let name = escape_html(full_name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("User"));
    let minutes = if ttl_minutes == 1 { "minute" } else { "minutes" };
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #667eea;">{title}</h1>
    <p>Hello {name},</p>
    <p>{intro}</p>
    <p style="font-size: 32px; font-weight: bold; letter-spacing: 5px; text-align: center;">{code}</p>
    <p><strong>This OTP will expire in {ttl_minutes} {minutes}.</strong></p>
    <p>If you didn't request this, please ignore this email.</p>
    <p>Best regards,<br><strong>The InsightBit Team</strong></p>
</body>
</html>"#
    )
}
