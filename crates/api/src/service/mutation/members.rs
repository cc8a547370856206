use chrono::Utc;
use serde::Deserialize;
use sqlx::{types::Json, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::member::{AssignableRole, MemberRole, MemberRow, Scope},
  error::{ApiError, ApiResult},
  service::{access, query},
};

const UPDATE_MEMBER_ROLE: &str = r#"
  UPDATE project_members
  SET role = ?1, scopes = COALESCE(?2, scopes), updated_at = ?3
  WHERE project_id = ?4 AND user_id = ?5
  RETURNING *
"#;
const DELETE_MEMBER: &str = "DELETE FROM project_members WHERE project_id = ?1 AND user_id = ?2";

#[derive(Debug, Deserialize)]
pub struct UpdateRoleParams {
  pub role: AssignableRole,
  /// Replaces the stored scopes when present.
  pub scopes: Option<Vec<Scope>>,
}

/// Changes the role of another member
///
/// Nothing prevents demoting the last admin; the owner always keeps full
/// control of the project.
///
/// # Errors
/// - PermissionDenied unless the actor is the owner or an admin
/// - ResourceNotFound if the user is not a member
/// - CannotChangeOwnerRole if the target is the owner
pub async fn update_role(
  pool: &SqlitePool,
  ctx: &ProjectContext,
  user_id: Uuid,
  params: UpdateRoleParams,
) -> ApiResult<MemberRow> {
  access::require_manager(pool, ctx).await?;

  let target = get_member(pool, ctx, user_id).await?;
  if target.role == MemberRole::Owner {
    return Err(ApiError::CannotChangeOwnerRole);
  }

  let member = sqlx::query_as::<_, MemberRow>(UPDATE_MEMBER_ROLE)
    .bind(MemberRole::from(params.role))
    .bind(params.scopes.map(Json))
    .bind(Utc::now())
    .bind(ctx.project_id())
    .bind(user_id)
    .fetch_one(pool)
    .await?;

  info!(
    project_id = %ctx.project_id(),
    user_id = %user_id,
    role = %member.role,
    "Changed member role"
  );

  Ok(member)
}

/// Removes a member from the project
///
/// # Errors
/// - PermissionDenied unless the actor is the owner or an admin
/// - CannotRemoveSelf if the actor targets their own membership
/// - ResourceNotFound if the user is not a member
/// - CannotRemoveOwner if the target is the owner
pub async fn remove(pool: &SqlitePool, ctx: &ProjectContext, user_id: Uuid) -> ApiResult<()> {
  access::require_manager(pool, ctx).await?;

  if user_id == ctx.actor_id() {
    return Err(ApiError::CannotRemoveSelf);
  }

  let target = get_member(pool, ctx, user_id).await?;
  if target.role == MemberRole::Owner {
    return Err(ApiError::CannotRemoveOwner);
  }

  sqlx::query(DELETE_MEMBER)
    .bind(ctx.project_id())
    .bind(user_id)
    .execute(pool)
    .await?;

  info!(project_id = %ctx.project_id(), user_id = %user_id, "Removed member");

  Ok(())
}

async fn get_member(pool: &SqlitePool, ctx: &ProjectContext, user_id: Uuid) -> ApiResult<MemberRow> {
  query::members::find(pool, ctx.project_id(), user_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(user_id.to_string()))
}
