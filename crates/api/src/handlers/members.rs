use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::{
    member::{AssignableRole, Member, Scope},
    user::User,
  },
  error::{ApiError, ApiResult},
  notifier::{Action, ChangeNotifier, Entity},
  service::{mutation, query},
  AppJson, AppState,
};

const MEMBERS_TAG: &str = "members";

pub fn init_members_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_members))
    .routes(routes!(update_member_role, remove_member))
}

#[utoipa::path(
  get,
  path = "/{project_id}/members",
  tag = MEMBERS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Members with their roles and scopes", body = [Member]),
    (status = 403, description = "Not a member of the project")
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn list_members(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let members = query::members::list(&pool, ctx.project_id()).await?;

  Ok(Json(members))
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateMemberRole {
  role: AssignableRole,
  scopes: Option<Vec<Scope>>,
}

#[utoipa::path(
  patch,
  path = "/{project_id}/members/{user_id}",
  tag = MEMBERS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("user_id" = Uuid, Path, description = "User id of the member")
  ),
  request_body = UpdateMemberRole,
  responses(
    (status = 200, description = "Role changed", body = Member),
    (status = 403, description = "Caller is not a manager, or the target is the owner"),
    (status = 404, description = "Member not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id, user_id = %user_id))]
async fn update_member_role(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, user_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<UpdateMemberRole>,
) -> ApiResult<Json<Member>> {
  debug!("Change member role with params {:?}", input);

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::members::update_role(
    &pool,
    &ctx,
    user_id,
    mutation::members::UpdateRoleParams {
      role: input.role,
      scopes: input.scopes,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Member, Action::Updated);

  let member = query::members::list(&pool, project_id)
    .await?
    .into_iter()
    .find(|member| member.user_id == user_id)
    .ok_or_else(|| ApiError::ResourceNotFound(user_id.to_string()))?;

  Ok(Json(member))
}

#[utoipa::path(
  delete,
  path = "/{project_id}/members/{user_id}",
  tag = MEMBERS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("user_id" = Uuid, Path, description = "User id of the member")
  ),
  responses(
    (status = 204, description = "Member removed"),
    (status = 403, description = "Caller is not a manager, targets themselves or the owner"),
    (status = 404, description = "Member not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id, user_id = %user_id))]
async fn remove_member(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::members::remove(&pool, &ctx, user_id).await?;

  notifier.publish(project_id, Entity::Member, Action::Deleted);

  Ok(StatusCode::NO_CONTENT)
}
