use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  context::ProjectContext,
  entities::{
    deliverable::{Deliverable, DeliverableStatus, DeliverableType},
    user::User,
  },
  error::ApiResult,
  notifier::{Action, ChangeNotifier, Entity},
  service::{mutation, query},
  AppJson, AppState,
};

const DELIVERABLES_TAG: &str = "deliverables";

pub fn init_deliverables_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_deliverables, create_deliverable))
    .routes(routes!(update_deliverable, delete_deliverable))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListDeliverablesParams {
  /// Only deliverables of this phase
  phase_id: Option<Uuid>,
}

#[utoipa::path(
  get,
  path = "/{project_id}/deliverables",
  tag = DELIVERABLES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ListDeliverablesParams
  ),
  responses(
    (status = 200, description = "Deliverables in display order", body = [Deliverable])
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn list_deliverables(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  Query(params): Query<ListDeliverablesParams>,
) -> ApiResult<Json<Vec<Deliverable>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let deliverables = query::deliverables::list(&pool, ctx.project_id(), params.phase_id).await?;

  Ok(Json(deliverables))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateDeliverable {
  phase_id: Uuid,
  #[validate(length(min = 1, max = 200))]
  name: String,
  description: Option<String>,
  r#type: Option<DeliverableType>,
  status: Option<DeliverableStatus>,
}

#[utoipa::path(
  post,
  path = "/{project_id}/deliverables",
  tag = DELIVERABLES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  request_body = CreateDeliverable,
  responses(
    (status = 201, description = "Deliverable created", body = Deliverable),
    (status = 400, description = "Validation error"),
    (status = 404, description = "Phase not found")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id))]
async fn create_deliverable(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  AppJson(input): AppJson<CreateDeliverable>,
) -> ApiResult<(StatusCode, Json<Deliverable>)> {
  debug!("Create deliverable with request: {:?}", input);

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let deliverable = mutation::deliverables::create(
    &pool,
    &ctx,
    mutation::deliverables::CreateDeliverableParams {
      phase_id: input.phase_id,
      name: input.name,
      description: input.description,
      r#type: input.r#type,
      status: input.status,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Deliverable, Action::Created);

  Ok((StatusCode::CREATED, Json(deliverable)))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateDeliverable {
  #[validate(length(min = 1, max = 200))]
  name: Option<String>,
  description: Option<String>,
  r#type: Option<DeliverableType>,
  status: Option<DeliverableStatus>,
  #[validate(range(min = 0))]
  order_index: Option<i64>,
  /// Reject the write unless the stored version still equals this one
  expected_version: Option<i64>,
}

#[utoipa::path(
  patch,
  path = "/{project_id}/deliverables/{deliverable_id}",
  tag = DELIVERABLES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("deliverable_id" = Uuid, Path, description = "Deliverable id")
  ),
  request_body = UpdateDeliverable,
  responses(
    (status = 200, description = "Deliverable updated", body = Deliverable),
    (status = 404, description = "Deliverable not found"),
    (status = 409, description = "Deliverable was modified by someone else")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id, deliverable_id = %deliverable_id))]
async fn update_deliverable(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, deliverable_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<UpdateDeliverable>,
) -> ApiResult<Json<Deliverable>> {
  debug!("Update deliverable with params {:?}", input);

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let deliverable = mutation::deliverables::update(
    &pool,
    &ctx,
    deliverable_id,
    mutation::deliverables::UpdateDeliverableParams {
      name: input.name,
      description: input.description,
      r#type: input.r#type,
      status: input.status,
      order_index: input.order_index,
      expected_version: input.expected_version,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Deliverable, Action::Updated);

  Ok(Json(deliverable))
}

#[utoipa::path(
  delete,
  path = "/{project_id}/deliverables/{deliverable_id}",
  tag = DELIVERABLES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("deliverable_id" = Uuid, Path, description = "Deliverable id")
  ),
  responses(
    (status = 204, description = "Deliverable deleted"),
    (status = 404, description = "Deliverable not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id, deliverable_id = %deliverable_id))]
async fn delete_deliverable(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, deliverable_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::deliverables::delete(&pool, &ctx, deliverable_id).await?;

  notifier.publish(project_id, Entity::Deliverable, Action::Deleted);

  Ok(StatusCode::NO_CONTENT)
}
