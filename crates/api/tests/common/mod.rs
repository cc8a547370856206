#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
  body::Body,
  http::{header, Method, Request, Response},
  Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;
use uuid::Uuid;

use designdesk_api::{
  config::{AuthConfig, Config, ServerConfig},
  context::ProjectContext,
  entities::{project::Project, user::User},
  mailer::{InvitationEmail, InvitationMailer, MailError},
  service::mutation,
  AppState,
};

pub const APP_ORIGIN: &str = "http://localhost:3000";

/// Mailer double that keeps every message it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
  sent: Mutex<Vec<InvitationEmail>>,
}

impl RecordingMailer {
  pub fn sent(&self) -> Vec<InvitationEmail> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl InvitationMailer for RecordingMailer {
  async fn send_invitation(&self, message: &InvitationEmail) -> Result<(), MailError> {
    self.sent.lock().unwrap().push(message.clone());
    Ok(())
  }
}

/// Mailer double whose delivery always fails.
pub struct FailingMailer;

#[async_trait]
impl InvitationMailer for FailingMailer {
  async fn send_invitation(&self, _message: &InvitationEmail) -> Result<(), MailError> {
    Err(MailError::Build("relay refused the message".into()))
  }
}

pub fn test_config() -> Config {
  Config {
    server: ServerConfig {
      host: "127.0.0.1".to_string(),
      port: 0,
      app_origin: APP_ORIGIN.to_string(),
    },
    auth: AuthConfig {
      jwt_secret: "integration-test-secret".to_string(),
      jwt_maxage_minutes: 60,
    },
    smtp: None,
  }
}

pub fn test_state(pool: SqlitePool) -> AppState {
  AppState::new(pool, test_config(), Arc::new(RecordingMailer::default()))
}

pub fn build_test_app(pool: SqlitePool) -> Router {
  designdesk_api::router(test_state(pool)).unwrap()
}

/// Inserts a user without going through password hashing.
pub async fn create_user(pool: &SqlitePool, email: &str, display_name: &str) -> User {
  sqlx::query_as::<_, User>(
    "INSERT INTO users (id, email, display_name, password) VALUES (?1, ?2, ?3, 'not-a-hash') RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(email)
  .bind(display_name)
  .fetch_one(pool)
  .await
  .unwrap()
}

pub async fn create_project(pool: &SqlitePool, owner: &User, name: &str) -> Project {
  mutation::projects::create(
    pool,
    owner,
    mutation::projects::CreateProjectParams {
      name: name.to_string(),
      description: Some(format!("{name} description")),
    },
  )
  .await
  .unwrap()
}

pub async fn context(pool: &SqlitePool, project_id: Uuid, user: &User) -> ProjectContext {
  ProjectContext::resolve(pool, project_id, user.clone()).await.unwrap()
}

/// Adds `user` to the project with the given role, bypassing invitations.
pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user: &User, role: &str) {
  sqlx::query("INSERT INTO project_members (id, project_id, user_id, role) VALUES (?1, ?2, ?3, ?4)")
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(user.id)
    .bind(role)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count(pool: &SqlitePool, sql: &str, id: Uuid) -> i64 {
  let (count,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await.unwrap();
  count
}

pub async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response<Body> {
  let mut builder = Request::builder().method(method).uri(uri);

  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }

  let request = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
  send(app, Method::GET, uri, token, None).await
}

pub async fn post_json(app: Router, uri: &str, token: Option<&str>, body: Value) -> Response<Body> {
  send(app, Method::POST, uri, token, Some(body)).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
  response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
  serde_json::from_slice(&body_bytes(response).await).unwrap()
}
