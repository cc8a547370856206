use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  middleware::from_fn_with_state,
  response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse,
  },
  Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio_stream::{
  wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
  StreamExt as _,
};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  context::ProjectContext,
  entities::{project::Project, user::User},
  error::{ApiError, ApiResult},
  export,
  mirror::ProjectMirror,
  notifier::{Action, ChangeEvent, ChangeNotifier, Entity},
  service::{mutation, query},
  AppJson, AppState,
};

use super::{
  auth::auth_guard, deliverables::init_deliverables_routes, documents::init_documents_routes,
  invitations::init_project_invitations_routes, members::init_members_routes, phases::init_phases_routes,
  tasks::init_tasks_routes,
};

const PROJECTS_TAG: &str = "projects";
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PROJECTS_PER_PAGE: i64 = 20;

pub fn init_projects_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_projects, create_project))
    .routes(routes!(get_project, update_project, delete_project))
    .routes(routes!(project_events))
    .routes(routes!(export_project))
    .merge(init_phases_routes())
    .merge(init_tasks_routes())
    .merge(init_deliverables_routes())
    .merge(init_members_routes())
    .merge(init_project_invitations_routes())
    .merge(init_documents_routes())
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListProjectsParams {
  page: Option<i64>,
  projects_per_page: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectPage {
  pub projects: Vec<Project>,
  pub total_pages: i64,
}

#[utoipa::path(
  get,
  path = "",
  tag = PROJECTS_TAG,
  params(
    ListProjectsParams
  ),
  responses(
    (status = 200, description = "Projects the current user belongs to", body = ProjectPage),
    (status = 401, description = "Unauthorized")
  )
)]
#[instrument(skip(pool, user), fields(user_id = %user.id))]
async fn list_projects(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Query(params): Query<ListProjectsParams>,
) -> ApiResult<Json<ProjectPage>> {
  let page = params.page.unwrap_or(DEFAULT_PAGE);
  let projects_per_page = params.projects_per_page.unwrap_or(DEFAULT_PROJECTS_PER_PAGE);

  let (projects, total_pages) = query::projects::list(&pool, user.id, page, projects_per_page).await?;

  Ok(Json(ProjectPage { projects, total_pages }))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateProject {
  #[validate(length(min = 1, max = 200))]
  name: String,
  description: Option<String>,
}

#[utoipa::path(
  post,
  path = "",
  tag = PROJECTS_TAG,
  request_body = CreateProject,
  responses(
    (status = 201, description = "Project created successfully", body = Project),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(user_id = %user.id))]
async fn create_project(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
  debug!("Register new project with request: {:?}", input);

  input.validate()?;

  let project = mutation::projects::create(
    &pool,
    &user,
    mutation::projects::CreateProjectParams {
      name: input.name,
      description: input.description,
    },
  )
  .await?;

  notifier.publish(project.id, Entity::Project, Action::Created);

  Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
  get,
  path = "/{project_id}",
  tag = PROJECTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Project details", body = Project),
    (status = 404, description = "Project not found")
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn get_project(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
  let project = query::projects::find_for_member(&pool, project_id, user.id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(project_id.to_string()))?;

  Ok(Json(project))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateProject {
  #[validate(length(min = 1, max = 200))]
  name: Option<String>,
  description: Option<String>,
}

#[utoipa::path(
  patch,
  path = "/{project_id}",
  tag = PROJECTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  request_body = UpdateProject,
  responses(
    (status = 200, description = "Project updated successfully", body = Project),
    (status = 403, description = "Only the owner or an admin may update the project")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id))]
async fn update_project(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  AppJson(input): AppJson<UpdateProject>,
) -> ApiResult<Json<Project>> {
  debug!("Update project with id {} and params {:?}", project_id, input);

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let project = mutation::projects::update(
    &pool,
    &ctx,
    mutation::projects::UpdateProjectParams {
      name: input.name,
      description: input.description,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Project, Action::Updated);

  Ok(Json(project))
}

#[utoipa::path(
  delete,
  path = "/{project_id}",
  tag = PROJECTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 204, description = "Project deleted"),
    (status = 403, description = "Only the owner may delete the project"),
    (status = 404, description = "Project not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id))]
async fn delete_project(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::projects::delete(&pool, &ctx).await?;

  notifier.publish(project_id, Entity::Project, Action::Deleted);

  Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
  get,
  path = "/{project_id}/events",
  tag = PROJECTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Server-sent stream of change events", body = String, content_type = "text/event-stream")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id))]
async fn project_events(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
  ProjectContext::resolve(&pool, project_id, user).await?;

  let stream = BroadcastStream::new(notifier.subscribe()).filter_map(move |msg| {
    let event = match StreamItem::for_project(project_id, msg)? {
      StreamItem::Change(change) => Event::default().event("change").json_data(change).ok()?,
      StreamItem::Resync { skipped } => {
        debug!(skipped, "Change stream lagged, asking client to resync");
        Event::default().event("resync").data(skipped.to_string())
      },
    };
    Some(Ok::<Event, Infallible>(event))
  });

  Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// What a project subscription forwards for one broadcast message.
#[derive(Debug, PartialEq, Eq)]
enum StreamItem {
  Change(ChangeEvent),
  /// The subscriber fell behind and missed `skipped` events, so the client
  /// must re-fetch everything.
  Resync { skipped: u64 },
}

impl StreamItem {
  fn for_project(project_id: Uuid, msg: Result<ChangeEvent, BroadcastStreamRecvError>) -> Option<Self> {
    match msg {
      Ok(change) if change.project_id == project_id => Some(StreamItem::Change(change)),
      Ok(_) => None,
      Err(BroadcastStreamRecvError::Lagged(skipped)) => Some(StreamItem::Resync { skipped }),
    }
  }
}

#[utoipa::path(
  get,
  path = "/{project_id}/export",
  tag = PROJECTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Markdown report of the project", body = String, content_type = "text/markdown")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id))]
async fn export_project(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let mirror = ProjectMirror::load(&pool, ctx).await?;
  if mirror.seeded() {
    notifier.publish(project_id, Entity::Phase, Action::Created);
  }

  let report = export::render_markdown(&mirror, Utc::now());
  let disposition = format!(
    "attachment; filename=\"{}\"",
    export::file_name(&mirror.context().project.name)
  );

  Ok((
    [
      (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    report,
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn change(project_id: Uuid) -> ChangeEvent {
    ChangeEvent {
      project_id,
      entity: Entity::Task,
      action: Action::Updated,
    }
  }

  #[test]
  fn test_stream_keeps_only_own_project() {
    let project_id = Uuid::new_v4();

    assert_eq!(
      StreamItem::for_project(project_id, Ok(change(project_id))),
      Some(StreamItem::Change(change(project_id)))
    );
    assert_eq!(StreamItem::for_project(project_id, Ok(change(Uuid::new_v4()))), None);
  }

  #[test]
  fn test_lagged_stream_asks_for_resync() {
    let item = StreamItem::for_project(Uuid::new_v4(), Err(BroadcastStreamRecvError::Lagged(7)));
    assert_eq!(item, Some(StreamItem::Resync { skipped: 7 }));
  }
}
