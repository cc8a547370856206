use std::sync::Arc;

use axum::{
  extract::{FromRef, FromRequest, State},
  http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
  },
  response::IntoResponse,
  routing::get,
  Router,
};
use error::ApiError;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use handlers::{
  auth::Keys, invitations::init_invitations_routes, projects::init_projects_routes, users::init_users_routes,
};
use mailer::InvitationMailer;
use notifier::ChangeNotifier;

pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod export;
mod handlers;
pub mod mailer;
pub mod mirror;
pub mod notifier;
pub mod service;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const DESIGNDESK_TAG: &str = "designdesk";

/// Shared state of the HTTP server. Handlers extract the parts they need.
#[derive(Clone, FromRef)]
pub struct AppState {
  pub pool: Arc<SqlitePool>,
  pub config: Arc<Config>,
  pub keys: Arc<Keys>,
  pub mailer: Arc<dyn InvitationMailer>,
  pub notifier: ChangeNotifier,
}

impl AppState {
  pub fn new(pool: SqlitePool, config: Config, mailer: Arc<dyn InvitationMailer>) -> Self {
    Self {
      pool: Arc::new(pool),
      keys: Arc::new(Keys::new(&config.auth)),
      config: Arc::new(config),
      mailer,
      notifier: ChangeNotifier::new(),
    }
  }
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct AppJson<T>(T);

/// Handle health check requests
async fn health_handler(State(pool): State<Arc<SqlitePool>>) -> impl IntoResponse {
  let res = sqlx::query("SELECT 1").execute(&*pool).await;
  match res {
    Ok(_) => json!({
      "code": "200",
      "success": true,
    })
    .to_string(),
    Err(_) => json!({
      "code": "500",
      "success": false,
    })
    .to_string(),
  }
}

/// Builds the application router, API docs included.
pub fn router(state: AppState) -> anyhow::Result<Router> {
  // Initialize cors settings
  let cors = CorsLayer::new()
    .allow_origin(state.config.server.app_origin.parse::<HeaderValue>()?)
    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
    .allow_credentials(true)
    .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

  #[derive(OpenApi)]
  #[openapi(
    tags(
      (name = DESIGNDESK_TAG, description = "Project phases, tasks, members and invitations")
    )
  )]
  struct ApiDoc;

  let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
    .route("/health", get(health_handler))
    .nest("/api/users", init_users_routes(state.clone()))
    .nest("/api/projects", init_projects_routes(state.clone()))
    .nest("/api/invitations", init_invitations_routes(state.clone()))
    .layer(CookieManagerLayer::new())
    .layer(cors)
    .with_state(state)
    .split_for_parts();

  Ok(router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api)))
}

pub async fn run(state: AppState, cancel_token: CancellationToken) -> anyhow::Result<()> {
  let server_url = state.config.server.bind_address();
  let router = router(state)?;

  info!(%server_url, "Starting api server...");

  let listener = TcpListener::bind(&server_url).await?;
  axum::serve(listener, router.into_make_service())
    .with_graceful_shutdown(Box::pin(async move { cancel_token.cancelled().await }))
    .await?;

  info!("Stopped api server");

  Ok(())
}
