//! Invitation email delivery.
//!
//! [`SmtpMailer`] sends a multipart (HTML + plain text) message through the
//! `lettre` async SMTP transport. When SMTP is not configured the server
//! falls back to [`LogMailer`], which only logs the invitation link so it can
//! be shared by hand.

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use crate::{entities::member::AssignableRole, service::mutation::invitations::INVITATION_TTL_DAYS};

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "noreply@designdesk.local";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
  #[error("SMTP transport error: {0}")]
  Transport(#[from] lettre::transport::smtp::Error),

  #[error("Email address parse error: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("Email build error: {0}")]
  Build(String),
}

/// Everything the invitation message needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationEmail {
  pub email: String,
  pub token: String,
  pub role: AssignableRole,
  pub project_name: String,
  pub inviter_name: String,
}

impl InvitationEmail {
  pub fn subject(&self) -> String {
    format!("{} invited you to join {}", self.inviter_name, self.project_name)
  }

  pub fn text_body(&self, origin: &str) -> String {
    format!(
      "{inviter} invited you to join the project \"{project}\" as {role}.\n\n\
       Accept or decline the invitation here:\n{link}\n\n\
       The invitation expires in {days} days.",
      inviter = self.inviter_name,
      project = self.project_name,
      role = self.role,
      link = invite_link(origin, &self.token),
      days = INVITATION_TTL_DAYS,
    )
  }

  pub fn html_body(&self, origin: &str) -> String {
    format!(
      "<p><strong>{inviter}</strong> invited you to join the project <strong>{project}</strong> as {role}.</p>\
       <p><a href=\"{link}\">Open the invitation</a></p>\
       <p>The invitation expires in {days} days.</p>",
      inviter = escape_html(&self.inviter_name),
      project = escape_html(&self.project_name),
      role = self.role,
      link = invite_link(origin, &self.token),
      days = INVITATION_TTL_DAYS,
    )
  }
}

/// Deep link handled by the web client's invitation page.
pub fn invite_link(origin: &str, token: &str) -> String {
  format!("{}/invite?token={}", origin.trim_end_matches('/'), token)
}

fn escape_html(value: &str) -> String {
  value
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

#[async_trait]
pub trait InvitationMailer: Send + Sync {
  async fn send_invitation(&self, message: &InvitationEmail) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
  pub smtp_host: String,
  pub smtp_port: u16,
  pub from_address: String,
  pub smtp_user: Option<String>,
  pub smtp_password: Option<String>,
}

impl SmtpConfig {
  /// Returns `None` if `SMTP_HOST` is not set.
  ///
  /// | Variable        | Required | Default                     |
  /// |-----------------|----------|-----------------------------|
  /// | `SMTP_HOST`     | yes      |                             |
  /// | `SMTP_PORT`     | no       | `587`                       |
  /// | `SMTP_FROM`     | no       | `noreply@designdesk.local`  |
  /// | `SMTP_USER`     | no       |                             |
  /// | `SMTP_PASSWORD` | no       |                             |
  pub fn from_env() -> anyhow::Result<Option<Self>> {
    let Ok(smtp_host) = std::env::var("SMTP_HOST") else {
      return Ok(None);
    };

    Ok(Some(Self {
      smtp_host,
      smtp_port: parse_smtp_port(std::env::var("SMTP_PORT").ok().as_deref())?,
      from_address: std::env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
      smtp_user: std::env::var("SMTP_USER").ok(),
      smtp_password: std::env::var("SMTP_PASSWORD").ok(),
    }))
  }
}

fn parse_smtp_port(value: Option<&str>) -> anyhow::Result<u16> {
  match value {
    Some(port) => port.parse::<u16>().context("SMTP_PORT must be a valid port number"),
    None => Ok(DEFAULT_SMTP_PORT),
  }
}

pub struct SmtpMailer {
  config: SmtpConfig,
  app_origin: String,
}

impl SmtpMailer {
  pub fn new(config: SmtpConfig, app_origin: impl Into<String>) -> Self {
    Self {
      config,
      app_origin: app_origin.into(),
    }
  }
}

#[async_trait]
impl InvitationMailer for SmtpMailer {
  async fn send_invitation(&self, message: &InvitationEmail) -> Result<(), MailError> {
    use lettre::{
      message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
      Tokio1Executor,
    };

    let email = Message::builder()
      .from(self.config.from_address.parse()?)
      .to(message.email.parse()?)
      .subject(message.subject())
      .multipart(MultiPart::alternative_plain_html(
        message.text_body(&self.app_origin),
        message.html_body(&self.app_origin),
      ))
      .map_err(|e| MailError::Build(e.to_string()))?;

    let mut transport_builder =
      AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?.port(self.config.smtp_port);

    if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
      transport_builder = transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    let mailer = transport_builder.build();
    mailer.send(email).await?;

    info!(to = %message.email, project = %message.project_name, "Invitation email sent");
    Ok(())
  }
}

/// Mailer used when SMTP is not configured.
pub struct LogMailer {
  app_origin: String,
}

impl LogMailer {
  pub fn new(app_origin: impl Into<String>) -> Self {
    Self {
      app_origin: app_origin.into(),
    }
  }
}

#[async_trait]
impl InvitationMailer for LogMailer {
  async fn send_invitation(&self, message: &InvitationEmail) -> Result<(), MailError> {
    info!(
      to = %message.email,
      link = %invite_link(&self.app_origin, &message.token),
      "SMTP is not configured, invitation link logged instead of sent"
    );
    Ok(())
  }
}
