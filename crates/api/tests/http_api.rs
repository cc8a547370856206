//! End-to-end requests against the full router.

mod common;

use axum::http::{header, StatusCode};
use serde_json::{json, Value};
use sqlx::SqlitePool;

async fn sign_up_and_login(pool: &SqlitePool, email: &str) -> String {
  let response = common::post_json(
    common::build_test_app(pool.clone()),
    "/api/users/signup",
    None,
    json!({ "email": email, "display_name": "Ann", "password": "correct-horse" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);

  let response = common::post_json(
    common::build_test_app(pool.clone()),
    "/api/users/login",
    None,
    json!({ "email": email, "password": "correct-horse" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  assert!(response.headers().get(header::SET_COOKIE).is_some());

  let body = common::body_json(response).await;
  body["token"].as_str().unwrap().to_string()
}

async fn create_project(pool: &SqlitePool, token: &str, name: &str) -> Value {
  let response = common::post_json(
    common::build_test_app(pool.clone()),
    "/api/projects",
    Some(token),
    json!({ "name": name, "description": "Online shop" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  common::body_json(response).await
}

#[sqlx::test]
async fn test_health(pool: SqlitePool) {
  let response = common::get(common::build_test_app(pool), "/health", None).await;
  assert_eq!(response.status(), StatusCode::OK);
}

/// Sign up, log in and read the session user back.
#[sqlx::test]
async fn test_signup_login_me(pool: SqlitePool) {
  let token = sign_up_and_login(&pool, "ann@x.com").await;

  let response = common::get(common::build_test_app(pool.clone()), "/api/users/me", Some(&token)).await;
  assert_eq!(response.status(), StatusCode::OK);

  let body = common::body_json(response).await;
  assert_eq!(body["email"], "ann@x.com");
  assert!(body.get("password").is_none());
}

#[sqlx::test]
async fn test_wrong_password_is_rejected(pool: SqlitePool) {
  sign_up_and_login(&pool, "ann@x.com").await;

  let response = common::post_json(
    common::build_test_app(pool),
    "/api/users/login",
    None,
    json!({ "email": "ann@x.com", "password": "wrong-password" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Project routes need a session.
#[sqlx::test]
async fn test_projects_require_auth(pool: SqlitePool) {
  let response = common::get(common::build_test_app(pool.clone()), "/api/projects", None).await;
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

  let response = common::get(common::build_test_app(pool), "/api/projects", Some("not-a-jwt")).await;
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

  let body = common::body_json(response).await;
  assert_eq!(body["kind"], "UNAUTHORIZED");
}

/// Listing phases seeds them, and the export carries every phase heading.
#[sqlx::test]
async fn test_phases_and_export(pool: SqlitePool) {
  let token = sign_up_and_login(&pool, "ann@x.com").await;
  let project = create_project(&pool, &token, "Web Shop").await;
  let project_id = project["id"].as_str().unwrap();

  let response = common::get(
    common::build_test_app(pool.clone()),
    &format!("/api/projects/{project_id}/phases"),
    Some(&token),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let phases = common::body_json(response).await;
  assert_eq!(phases.as_array().unwrap().len(), 4);
  assert_eq!(phases[0]["name"], "Requirements Definition");
  assert_eq!(phases[3]["order_index"], 4);

  let response = common::get(
    common::build_test_app(pool.clone()),
    &format!("/api/projects/{project_id}/export"),
    Some(&token),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);

  let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
  assert!(content_type.starts_with("text/markdown"));
  let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
  assert_eq!(disposition, "attachment; filename=\"web-shop.md\"");

  let report = String::from_utf8(common::body_bytes(response).await).unwrap();
  assert!(report.starts_with("# Web Shop"));
  assert!(report.contains("## 1. Requirements Definition"));
  assert!(report.contains("## 4. Development Preparation"));
}

/// Outsiders get no access to someone else's project.
#[sqlx::test]
async fn test_non_member_is_forbidden(pool: SqlitePool) {
  let owner_token = sign_up_and_login(&pool, "owner@x.com").await;
  let stranger_token = sign_up_and_login(&pool, "stranger@x.com").await;
  let project = create_project(&pool, &owner_token, "Shop").await;
  let project_id = project["id"].as_str().unwrap();

  let response = common::get(
    common::build_test_app(pool),
    &format!("/api/projects/{project_id}/tasks"),
    Some(&stranger_token),
  )
  .await;
  assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// The invite link flow: preview, accept, then the token is gone.
#[sqlx::test]
async fn test_invitation_flow(pool: SqlitePool) {
  let owner_token = sign_up_and_login(&pool, "owner@x.com").await;
  let invitee_token = sign_up_and_login(&pool, "a@x.com").await;
  let project = create_project(&pool, &owner_token, "Shop").await;
  let project_id = project["id"].as_str().unwrap();

  let response = common::post_json(
    common::build_test_app(pool.clone()),
    &format!("/api/projects/{project_id}/invitations"),
    Some(&owner_token),
    json!({ "email": "a@x.com", "role": "admin" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  let invitation = common::body_json(response).await;
  let token = invitation["token"].as_str().unwrap();

  let response = common::get(
    common::build_test_app(pool.clone()),
    &format!("/api/invitations/{token}"),
    None,
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let preview = common::body_json(response).await;
  assert_eq!(preview["project_name"], "Shop");
  assert_eq!(preview["role"], "admin");

  let accept_uri = format!("/api/invitations/{token}/accept");

  let response = common::post_json(common::build_test_app(pool.clone()), &accept_uri, None, json!({})).await;
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

  let response = common::post_json(
    common::build_test_app(pool.clone()),
    &accept_uri,
    Some(&invitee_token),
    json!({}),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  let member = common::body_json(response).await;
  assert_eq!(member["email"], "a@x.com");
  assert_eq!(member["role"], "admin");

  let response = common::get(
    common::build_test_app(pool),
    &format!("/api/invitations/{token}"),
    None,
  )
  .await;
  assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Declining needs no session and can be repeated.
#[sqlx::test]
async fn test_decline_is_idempotent(pool: SqlitePool) {
  let owner_token = sign_up_and_login(&pool, "owner@x.com").await;
  let project = create_project(&pool, &owner_token, "Shop").await;
  let project_id = project["id"].as_str().unwrap();

  let response = common::post_json(
    common::build_test_app(pool.clone()),
    &format!("/api/projects/{project_id}/invitations"),
    Some(&owner_token),
    json!({ "email": "a@x.com" }),
  )
  .await;
  assert_eq!(response.status(), StatusCode::CREATED);
  let invitation = common::body_json(response).await;
  let token = invitation["token"].as_str().unwrap();

  for _ in 0..2 {
    let response = common::post_json(
      common::build_test_app(pool.clone()),
      &format!("/api/invitations/{token}/decline"),
      None,
      json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
  }

  let response = common::get(
    common::build_test_app(pool),
    &format!("/api/projects/{project_id}/invitations"),
    Some(&owner_token),
  )
  .await;
  assert_eq!(response.status(), StatusCode::OK);
  assert!(common::body_json(response).await.as_array().unwrap().is_empty());
}
