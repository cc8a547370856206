use chrono::Utc;
use serde::Deserialize;
use sqlx::{types::Json, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::{
    member::{MemberRole, Scope},
    project::{Project, ProjectRow},
    user::User,
  },
  error::{ApiError, ApiResult},
  service::{access, query},
};

// SQL Query Constants
const INSERT_PROJECT: &str = r#"
    INSERT INTO projects (id, name, description, owner_id)
    VALUES (?1, ?2, ?3, ?4)
    RETURNING *
"#;
const INSERT_OWNER_MEMBERSHIP: &str = r#"
    INSERT INTO project_members (id, project_id, user_id, role, scopes)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;
const UPDATE_PROJECT: &str = r#"
    UPDATE projects
    SET name = ?1, description = ?2, updated_at = ?3
    WHERE id = ?4
    RETURNING *
"#;
const DELETE_PROJECT: &str = "DELETE FROM projects WHERE id = ?1";

#[derive(Debug, Deserialize)]
pub struct CreateProjectParams {
  pub name: String,
  pub description: Option<String>,
}

/// Creates a new project owned by `owner`
///
/// The project row and the owner's membership are written in one
/// transaction, so a project never exists without exactly one owner.
///
/// # Errors
/// - DatabaseError for any database-related issues
pub async fn create(pool: &SqlitePool, owner: &User, params: CreateProjectParams) -> ApiResult<Project> {
  let mut tx = pool.begin().await?;

  let project = sqlx::query_as::<_, ProjectRow>(INSERT_PROJECT)
    .bind(Uuid::new_v4())
    .bind(&params.name)
    .bind(params.description.unwrap_or_default())
    .bind(owner.id)
    .fetch_one(&mut *tx)
    .await?;

  sqlx::query(INSERT_OWNER_MEMBERSHIP)
    .bind(Uuid::new_v4())
    .bind(project.id)
    .bind(owner.id)
    .bind(MemberRole::Owner)
    .bind(Json(Vec::<Scope>::new()))
    .execute(&mut *tx)
    .await?;

  tx.commit().await?;

  info!(project_id = %project.id, owner_id = %owner.id, "Created project");

  Ok(build_project(project, owner.clone(), MemberRole::Owner))
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateProjectParams {
  pub name: Option<String>,
  pub description: Option<String>,
}

/// Renames or re-describes the project in context
///
/// # Errors
/// - PermissionDenied unless the actor is the owner or an admin
/// - DatabaseError for any database-related issues
pub async fn update(pool: &SqlitePool, ctx: &ProjectContext, params: UpdateProjectParams) -> ApiResult<Project> {
  let membership = access::require_manager(pool, ctx).await?;

  let project = sqlx::query_as::<_, ProjectRow>(UPDATE_PROJECT)
    .bind(params.name.unwrap_or_else(|| ctx.project.name.clone()))
    .bind(params.description.unwrap_or_else(|| ctx.project.description.clone()))
    .bind(Utc::now())
    .bind(ctx.project_id())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(ctx.project_id().to_string()))?;

  let owner = get_owner(pool, project.owner_id).await?;

  Ok(build_project(project, owner, membership.role))
}

/// Deletes the project in context together with everything it owns
///
/// # Errors
/// - PermissionDenied unless the actor is the owner
/// - DatabaseError for any database-related issues
pub async fn delete(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<()> {
  access::require_owner(pool, ctx).await?;

  sqlx::query(DELETE_PROJECT).bind(ctx.project_id()).execute(pool).await?;

  info!(project_id = %ctx.project_id(), "Deleted project");

  Ok(())
}

async fn get_owner(pool: &SqlitePool, user_id: Uuid) -> ApiResult<User> {
  query::users::find_by_id(pool, user_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(user_id.to_string()))
}

fn build_project(project: ProjectRow, owner: User, role: MemberRole) -> Project {
  Project {
    id: project.id,
    name: project.name,
    description: project.description,
    owner,
    role,
    created_at: project.created_at,
    updated_at: project.updated_at,
  }
}
