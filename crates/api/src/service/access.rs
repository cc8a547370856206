use sqlx::SqlitePool;

use crate::{
  context::ProjectContext,
  entities::member::{MemberRole, MemberRow},
  error::{ApiError, ApiResult},
  service::query,
};

/// Re-reads the actor's membership and requires the owner or admin role.
///
/// Called at the start of every member-management mutation so that a role
/// change made after the context was resolved is taken into account.
pub async fn require_manager(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<MemberRow> {
  let membership = current_membership(pool, ctx).await?;

  if !membership.role.can_manage() {
    return Err(ApiError::PermissionDenied("only the project owner or an admin can do this"));
  }

  Ok(membership)
}

pub async fn require_owner(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<MemberRow> {
  let membership = current_membership(pool, ctx).await?;

  if membership.role != MemberRole::Owner {
    return Err(ApiError::PermissionDenied("only the project owner can do this"));
  }

  Ok(membership)
}

async fn current_membership(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<MemberRow> {
  query::members::find(pool, ctx.project_id(), ctx.actor_id())
    .await?
    .ok_or(ApiError::PermissionDenied("you are not a member of this project"))
}
