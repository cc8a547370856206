use std::sync::Arc;

use axum::{
  extract::{Path, State},
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::instrument;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::{phase::PhaseSummary, user::User},
  error::ApiResult,
  notifier::{Action, ChangeNotifier, Entity},
  service::{mutation, query},
  AppState,
};

const PHASES_TAG: &str = "phases";

pub fn init_phases_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_phases))
    .routes(routes!(seed_phases))
}

#[utoipa::path(
  get,
  path = "/{project_id}/phases",
  tag = PHASES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Phases in order with their progress", body = [PhaseSummary]),
    (status = 403, description = "Not a member of the project")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id))]
async fn list_phases(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PhaseSummary>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;

  if mutation::phases::ensure_phases(&pool, &ctx).await?.seeded {
    notifier.publish(project_id, Entity::Phase, Action::Created);
  }

  let phases = query::phases::list_summaries(&pool, project_id).await?;

  Ok(Json(phases))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeedResponse {
  pub tasks: u64,
  pub deliverables: u64,
}

#[utoipa::path(
  post,
  path = "/{project_id}/phases/seed",
  tag = PHASES_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Catalogue items that were missing and got created", body = SeedResponse),
    (status = 403, description = "Not a member of the project")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id))]
async fn seed_phases(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<Json<SeedResponse>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;

  if mutation::phases::ensure_phases(&pool, &ctx).await?.seeded {
    notifier.publish(project_id, Entity::Phase, Action::Created);
  }
  let report = mutation::phases::create_missing_items(&pool, &ctx).await?;

  if report.tasks > 0 {
    notifier.publish(project_id, Entity::Task, Action::Created);
  }
  if report.deliverables > 0 {
    notifier.publish(project_id, Entity::Deliverable, Action::Created);
  }

  Ok(Json(SeedResponse {
    tasks: report.tasks,
    deliverables: report.deliverables,
  }))
}
