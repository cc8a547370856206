use std::{env, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use designdesk_api::{
  config::Config,
  mailer::{InvitationMailer, LogMailer, SmtpMailer},
  AppState, MIGRATOR,
};

const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  let log_level = env::var("DESIGNDESK_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
  let db_url = env::var("DATABASE_URL").context("DATABASE_URL is not set in .env file")?;

  let env_filter = EnvFilter::from_default_env().add_directive(log_level.parse()?);

  // Initialize tracing subscriber with the environment filter
  tracing_subscriber::fmt().with_env_filter(env_filter).init();

  if rustls::crypto::ring::default_provider().install_default().is_err() {
    warn!("A rustls crypto provider was already installed");
  }

  let config = Config::from_env()?;

  let cancel_token = CancellationToken::new();

  // Start task for catching interrupt
  tokio::spawn({
    let cancel_token = cancel_token.clone();
    async move {
      let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
          error!("Failed to install Ctrl+C handler: {}", err);
          std::future::pending::<()>().await;
        }
      };

      #[cfg(unix)]
      let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
          Ok(mut signal) => {
            signal.recv().await;
          },
          Err(err) => {
            error!("Failed to install signal handler: {}", err);
            std::future::pending::<()>().await;
          },
        }
      };

      #[cfg(not(unix))]
      let terminate = std::future::pending::<()>();

      tokio::select! {
        _ = ctrl_c => {
          info!("Received Ctrl-C, shutting down...");
          cancel_token.cancel()
        },
        _ = terminate => {
          info!("Received terminate, shutting down...");
          cancel_token.cancel()
        },
      }
    }
  });

  let connect_options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .max_connections(100)
    .min_connections(5)
    .connect_with(connect_options)
    .await
    .context("Database connection failed")?;

  MIGRATOR.run(&pool).await.context("Database migration failed")?;

  let mailer: Arc<dyn InvitationMailer> = match config.smtp.clone() {
    Some(smtp) => {
      info!(host = %smtp.smtp_host, "Sending invitation emails over SMTP");
      Arc::new(SmtpMailer::new(smtp, config.server.app_origin.clone()))
    },
    None => {
      warn!("SMTP_HOST is not set, invitation links will only be logged");
      Arc::new(LogMailer::new(config.server.app_origin.clone()))
    },
  };

  let state = AppState::new(pool, config, mailer);
  let pool = state.pool.clone();

  if let Err(err) = designdesk_api::run(state, cancel_token).await {
    error!("Api server stopped with error: {:?}", err);
  }

  pool.close().await;

  Ok(())
}
