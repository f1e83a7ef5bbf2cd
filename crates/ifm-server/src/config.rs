use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use ifm_mail::SmtpConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub picture_dir: PathBuf,
    pub jwt_secret: String,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub verification_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read configuration from the environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let jwt_secret = lookup("IFM_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("IFM_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let smtp = match lookup("IFM_SMTP_HOST") {
            Some(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: parsed(&lookup, "IFM_SMTP_PORT", 465)?,
                username: lookup("IFM_SMTP_USERNAME"),
                password: lookup("IFM_SMTP_PASSWORD"),
            }),
            _ => None,
        };

        Ok(Self {
            host: var_or("IFM_HOST", "0.0.0.0"),
            port: parsed(&lookup, "IFM_PORT", 9090)?,
            db_path: var_or("IFM_DB_PATH", "ifm.db").into(),
            picture_dir: var_or("IFM_PICTURE_DIR", "./resources/images/channel").into(),
            jwt_secret,
            smtp,
            mail_from: var_or("IFM_MAIL_FROM", "no-reply@ifm.local"),
            verification_ttl: Duration::from_secs(parsed(&lookup, "IFM_VERIFICATION_TTL_SECS", 300)?),
            max_upload_bytes: parsed(&lookup, "IFM_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parsed<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
