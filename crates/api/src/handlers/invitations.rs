use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  config::Config,
  context::ProjectContext,
  entities::{
    invitation::{Invitation, InvitationPreview},
    member::{AssignableRole, Member, Scope},
    user::User,
  },
  error::{ApiError, ApiResult},
  mailer::InvitationMailer,
  notifier::{Action, ChangeNotifier, Entity},
  service::{access, mutation, query},
  AppJson, AppState,
};

use super::auth::auth_guard;

const INVITATIONS_TAG: &str = "invitations";

/// Invitation management inside a project, mounted under `/api/projects`.
pub fn init_project_invitations_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new().routes(routes!(list_invitations, issue_invitation))
}

/// Token based routes used by the invite link, mounted under `/api/invitations`.
pub fn init_invitations_routes(state: AppState) -> OpenApiRouter<AppState> {
  let public_routes = OpenApiRouter::new()
    .routes(routes!(preview_invitation))
    .routes(routes!(decline_invitation));

  let protected_routes = OpenApiRouter::new()
    .routes(routes!(accept_invitation))
    .layer(from_fn_with_state(state, auth_guard));

  public_routes.merge(protected_routes)
}

#[utoipa::path(
  get,
  path = "/{project_id}/invitations",
  tag = INVITATIONS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Outstanding invitations, expired ones flagged", body = [Invitation]),
    (status = 403, description = "Only the owner or an admin may list invitations")
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn list_invitations(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Invitation>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  access::require_manager(&pool, &ctx).await?;

  let invitations = query::invitations::list(&pool, ctx.project_id())
    .await?
    .into_iter()
    .map(Invitation::from)
    .collect();

  Ok(Json(invitations))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct IssueInvitation {
  #[validate(length(min = 1))]
  email: String,
  #[serde(default)]
  role: AssignableRole,
  #[serde(default)]
  scopes: Vec<Scope>,
}

#[utoipa::path(
  post,
  path = "/{project_id}/invitations",
  tag = INVITATIONS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  request_body = IssueInvitation,
  responses(
    (status = 201, description = "Invitation created and emailed", body = Invitation),
    (status = 400, description = "Validation error"),
    (status = 403, description = "Only the owner or an admin may invite"),
    (status = 502, description = "Invitation created, but the email could not be sent")
  )
)]
#[instrument(skip(pool, notifier, mailer, config, user, input), fields(project_id = %project_id))]
async fn issue_invitation(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  State(mailer): State<Arc<dyn InvitationMailer>>,
  State(config): State<Arc<Config>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  AppJson(input): AppJson<IssueInvitation>,
) -> ApiResult<(StatusCode, Json<Invitation>)> {
  debug!(role = %input.role, "Issue invitation");

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let result = mutation::invitations::issue(
    &pool,
    mailer.as_ref(),
    &config.server.app_origin,
    &ctx,
    mutation::invitations::IssueInvitationParams {
      email: input.email,
      role: input.role,
      scopes: input.scopes,
    },
  )
  .await;

  if matches!(result, Ok(_) | Err(ApiError::InvitationEmailFailed { .. })) {
    notifier.publish(project_id, Entity::Invitation, Action::Created);
  }

  Ok((StatusCode::CREATED, Json(result?)))
}

#[utoipa::path(
  get,
  path = "/{token}",
  tag = INVITATIONS_TAG,
  params(
    ("token" = String, Path, description = "Invitation token from the invite link")
  ),
  responses(
    (status = 200, description = "What the invitation grants", body = InvitationPreview),
    (status = 404, description = "Unknown or consumed invitation")
  )
)]
#[instrument(skip_all)]
async fn preview_invitation(
  State(pool): State<Arc<SqlitePool>>,
  Path(token): Path<String>,
) -> ApiResult<Json<InvitationPreview>> {
  let preview = query::invitations::preview(&pool, &token)
    .await?
    .ok_or(ApiError::InvalidInvitation)?;

  Ok(Json(preview))
}

#[utoipa::path(
  post,
  path = "/{token}/accept",
  tag = INVITATIONS_TAG,
  params(
    ("token" = String, Path, description = "Invitation token from the invite link")
  ),
  responses(
    (status = 200, description = "Joined the project", body = Member),
    (status = 401, description = "Unauthorized"),
    (status = 403, description = "Signed in with a different email than the invitee"),
    (status = 404, description = "Unknown or consumed invitation"),
    (status = 409, description = "Already a member of the project"),
    (status = 410, description = "Invitation expired")
  )
)]
#[instrument(skip_all, fields(user_id = %user.id))]
async fn accept_invitation(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(token): Path<String>,
) -> ApiResult<Json<Member>> {
  let membership = mutation::invitations::accept(&pool, &token, &user).await?;

  notifier.publish(membership.project_id, Entity::Member, Action::Created);
  notifier.publish(membership.project_id, Entity::Invitation, Action::Deleted);

  let member = query::members::list(&pool, membership.project_id)
    .await?
    .into_iter()
    .find(|member| member.id == membership.id)
    .ok_or_else(|| ApiError::ResourceNotFound(membership.id.to_string()))?;

  Ok(Json(member))
}

#[utoipa::path(
  post,
  path = "/{token}/decline",
  tag = INVITATIONS_TAG,
  params(
    ("token" = String, Path, description = "Invitation token from the invite link")
  ),
  responses(
    (status = 204, description = "Invitation declined, or already gone")
  )
)]
#[instrument(skip_all)]
async fn decline_invitation(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Path(token): Path<String>,
) -> ApiResult<StatusCode> {
  if let Some(invitation) = mutation::invitations::decline(&pool, &token).await? {
    notifier.publish(invitation.project_id, Entity::Invitation, Action::Deleted);
  }

  Ok(StatusCode::NO_CONTENT)
}
