//! Project lifecycle and ownership.

mod common;

use designdesk_api::{
  entities::member::MemberRole,
  error::ApiError,
  service::{mutation, query},
};
use sqlx::SqlitePool;

/// Creating a project leaves exactly one owner membership, held by the creator.
#[sqlx::test]
async fn test_create_project_adds_single_owner(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;

  assert_eq!(project.role, MemberRole::Owner);
  assert_eq!(project.owner.id, owner.id);

  let members = query::members::list(&pool, project.id).await.unwrap();
  assert_eq!(members.len(), 1);
  assert_eq!(members[0].user_id, owner.id);
  assert_eq!(members[0].role, MemberRole::Owner);

  let owners = common::count(
    &pool,
    "SELECT COUNT(*) FROM project_members WHERE project_id = ?1 AND role = 'owner'",
    project.id,
  )
  .await;
  assert_eq!(owners, 1);
}

/// Listing only returns projects the user belongs to.
#[sqlx::test]
async fn test_list_projects_is_scoped_to_membership(pool: SqlitePool) {
  let alice = common::create_user(&pool, "alice@x.com", "Alice").await;
  let bob = common::create_user(&pool, "bob@x.com", "Bob").await;

  common::create_project(&pool, &alice, "Alpha").await;
  common::create_project(&pool, &alice, "Beta").await;
  let gamma = common::create_project(&pool, &bob, "Gamma").await;

  let (projects, total_pages) = query::projects::list(&pool, alice.id, 1, 10).await.unwrap();
  assert_eq!(projects.len(), 2);
  assert_eq!(total_pages, 1);
  assert!(projects.iter().all(|project| project.id != gamma.id));

  let (first_page, total_pages) = query::projects::list(&pool, alice.id, 1, 1).await.unwrap();
  assert_eq!(first_page.len(), 1);
  assert_eq!(total_pages, 2);
}

/// Non-members cannot resolve a project context.
#[sqlx::test]
async fn test_context_rejects_non_members(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let stranger = common::create_user(&pool, "stranger@x.com", "Stranger").await;
  let project = common::create_project(&pool, &owner, "Shop").await;

  let result = designdesk_api::context::ProjectContext::resolve(&pool, project.id, stranger).await;
  assert!(matches!(result, Err(ApiError::PermissionDenied(_))));
}

/// A plain member may not rename the project.
#[sqlx::test]
async fn test_member_cannot_update_project(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let member = common::create_user(&pool, "member@x.com", "Member").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  common::add_member(&pool, project.id, &member, "member").await;

  let ctx = common::context(&pool, project.id, &member).await;
  let result = mutation::projects::update(
    &pool,
    &ctx,
    mutation::projects::UpdateProjectParams {
      name: Some("Renamed".into()),
      description: None,
    },
  )
  .await;

  assert!(matches!(result, Err(ApiError::PermissionDenied(_))));
  let stored = query::projects::find_by_id(&pool, project.id).await.unwrap().unwrap();
  assert_eq!(stored.name, "Shop");
}

/// Only the owner may delete, and deleting removes every child row.
#[sqlx::test]
async fn test_delete_project_cascades(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let admin = common::create_user(&pool, "admin@x.com", "Admin").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  common::add_member(&pool, project.id, &admin, "admin").await;

  let owner_ctx = common::context(&pool, project.id, &owner).await;
  mutation::phases::ensure_phases(&pool, &owner_ctx).await.unwrap();

  let admin_ctx = common::context(&pool, project.id, &admin).await;
  assert!(matches!(
    mutation::projects::delete(&pool, &admin_ctx).await,
    Err(ApiError::PermissionDenied(_))
  ));

  mutation::projects::delete(&pool, &owner_ctx).await.unwrap();

  assert!(query::projects::find_by_id(&pool, project.id).await.unwrap().is_none());
  for sql in [
    "SELECT COUNT(*) FROM phases WHERE project_id = ?1",
    "SELECT COUNT(*) FROM project_members WHERE project_id = ?1",
  ] {
    assert_eq!(common::count(&pool, sql, project.id).await, 0, "{sql}");
  }
  let (tasks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks").fetch_one(&pool).await.unwrap();
  assert_eq!(tasks, 0);
}
