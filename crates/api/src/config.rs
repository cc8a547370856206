use std::env;

use anyhow::{Context, Result};

use crate::mailer::SmtpConfig;

const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_JWT_MAXAGE_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
  pub server: ServerConfig,
  pub auth: AuthConfig,
  /// SMTP delivery settings, `None` when `SMTP_HOST` is not set.
  pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  /// Origin of the web client. Used for CORS and for invitation links.
  pub app_origin: String,
}

impl ServerConfig {
  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

#[derive(Clone)]
pub struct AuthConfig {
  pub jwt_secret: String,
  pub jwt_maxage_minutes: i64,
}

impl std::fmt::Debug for AuthConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AuthConfig")
      .field("jwt_secret", &"[redacted]")
      .field("jwt_maxage_minutes", &self.jwt_maxage_minutes)
      .finish()
  }
}

impl Config {
  /// Reads the configuration from the process environment.
  ///
  /// | Variable       | Required | Default                 |
  /// |----------------|----------|-------------------------|
  /// | `HOST`         | yes      |                         |
  /// | `PORT`         | yes      |                         |
  /// | `JWT_SECRET`   | yes      |                         |
  /// | `JWT_MAXAGE`   | no       | `1440` (minutes)        |
  /// | `APP_ORIGIN`   | no       | `http://localhost:3000` |
  /// | `SMTP_*`       | no       | see [`SmtpConfig`]      |
  pub fn from_env() -> Result<Self> {
    let host = required("HOST")?;
    let port = required("PORT")?
      .parse::<u16>()
      .context("PORT must be a valid port number")?;
    let app_origin = env::var("APP_ORIGIN").unwrap_or_else(|_| DEFAULT_APP_ORIGIN.to_string());

    let jwt_secret = required("JWT_SECRET")?;
    let jwt_maxage_minutes = match env::var("JWT_MAXAGE") {
      Ok(value) => value.parse::<i64>().context("JWT_MAXAGE must be a number of minutes")?,
      Err(_) => DEFAULT_JWT_MAXAGE_MINUTES,
    };

    Ok(Self {
      server: ServerConfig {
        host,
        port,
        app_origin: app_origin.trim_end_matches('/').to_string(),
      },
      auth: AuthConfig {
        jwt_secret,
        jwt_maxage_minutes,
      },
      smtp: SmtpConfig::from_env()?,
    })
  }
}

fn required(name: &str) -> Result<String> {
  env::var(name).with_context(|| format!("{name} is not set in .env file"))
}
