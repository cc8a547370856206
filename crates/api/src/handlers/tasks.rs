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
    task::{Task, TaskPriority, TaskStatus},
    user::User,
  },
  error::ApiResult,
  notifier::{Action, ChangeNotifier, Entity},
  service::{mutation, query},
  AppJson, AppState,
};

const TASKS_TAG: &str = "tasks";

pub fn init_tasks_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_tasks, create_task))
    .routes(routes!(update_task, delete_task))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListTasksParams {
  /// Only tasks of this phase
  phase_id: Option<Uuid>,
}

#[utoipa::path(
  get,
  path = "/{project_id}/tasks",
  tag = TASKS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ListTasksParams
  ),
  responses(
    (status = 200, description = "Tasks in display order", body = [Task])
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn list_tasks(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  Query(params): Query<ListTasksParams>,
) -> ApiResult<Json<Vec<Task>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let tasks = query::tasks::list(&pool, ctx.project_id(), params.phase_id).await?;

  Ok(Json(tasks))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateTask {
  phase_id: Uuid,
  #[validate(length(min = 1, max = 200))]
  title: String,
  description: Option<String>,
  status: Option<TaskStatus>,
  priority: Option<TaskPriority>,
}

#[utoipa::path(
  post,
  path = "/{project_id}/tasks",
  tag = TASKS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  request_body = CreateTask,
  responses(
    (status = 201, description = "Task created", body = Task),
    (status = 400, description = "Validation error"),
    (status = 404, description = "Phase not found")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id))]
async fn create_task(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  AppJson(input): AppJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
  debug!("Create task with request: {:?}", input);

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let task = mutation::tasks::create(
    &pool,
    &ctx,
    mutation::tasks::CreateTaskParams {
      phase_id: input.phase_id,
      title: input.title,
      description: input.description,
      status: input.status,
      priority: input.priority,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Task, Action::Created);

  Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateTask {
  #[validate(length(min = 1, max = 200))]
  title: Option<String>,
  description: Option<String>,
  status: Option<TaskStatus>,
  priority: Option<TaskPriority>,
  #[validate(range(min = 0))]
  order_index: Option<i64>,
  /// Reject the write unless the stored version still equals this one
  expected_version: Option<i64>,
}

#[utoipa::path(
  patch,
  path = "/{project_id}/tasks/{task_id}",
  tag = TASKS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("task_id" = Uuid, Path, description = "Task id")
  ),
  request_body = UpdateTask,
  responses(
    (status = 200, description = "Task updated", body = Task),
    (status = 404, description = "Task not found"),
    (status = 409, description = "Task was modified by someone else")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id, task_id = %task_id))]
async fn update_task(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, task_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<UpdateTask>,
) -> ApiResult<Json<Task>> {
  debug!("Update task with params {:?}", input);

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let task = mutation::tasks::update(
    &pool,
    &ctx,
    task_id,
    mutation::tasks::UpdateTaskParams {
      title: input.title,
      description: input.description,
      status: input.status,
      priority: input.priority,
      order_index: input.order_index,
      expected_version: input.expected_version,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Task, Action::Updated);

  Ok(Json(task))
}

#[utoipa::path(
  delete,
  path = "/{project_id}/tasks/{task_id}",
  tag = TASKS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("task_id" = Uuid, Path, description = "Task id")
  ),
  responses(
    (status = 204, description = "Task deleted"),
    (status = 404, description = "Task not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id, task_id = %task_id))]
async fn delete_task(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::tasks::delete(&pool, &ctx, task_id).await?;

  notifier.publish(project_id, Entity::Task, Action::Deleted);

  Ok(StatusCode::NO_CONTENT)
}
