use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::task::{Task, TaskPriority, TaskStatus},
  error::{ApiError, ApiResult},
  service::query,
};

// SQL Query Constants
const INSERT_TASK: &str = r#"
  INSERT INTO tasks (id, phase_id, title, description, status, priority, order_index)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, (SELECT COALESCE(MAX(order_index), 0) + 1 FROM tasks WHERE phase_id = ?2))
  RETURNING *
"#;
const UPDATE_TASK: &str = r#"
  UPDATE tasks
  SET
    title = COALESCE(?1, title),
    description = COALESCE(?2, description),
    status = COALESCE(?3, status),
    priority = COALESCE(?4, priority),
    order_index = COALESCE(?5, order_index),
    version = version + 1,
    updated_at = ?6
  WHERE id = ?7 AND (?8 IS NULL OR version = ?8)
  RETURNING *
"#;
const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";

#[derive(Debug, Deserialize)]
pub struct CreateTaskParams {
  pub phase_id: Uuid,
  pub title: String,
  pub description: Option<String>,
  pub status: Option<TaskStatus>,
  pub priority: Option<TaskPriority>,
}

/// Appends a task to the end of a phase
///
/// # Errors
/// - ResourceNotFound if the phase is not part of the project
pub async fn create(pool: &SqlitePool, ctx: &ProjectContext, params: CreateTaskParams) -> ApiResult<Task> {
  query::phases::find(pool, ctx.project_id(), params.phase_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(params.phase_id.to_string()))?;

  sqlx::query_as::<_, Task>(INSERT_TASK)
    .bind(Uuid::new_v4())
    .bind(params.phase_id)
    .bind(&params.title)
    .bind(params.description.unwrap_or_default())
    .bind(params.status.unwrap_or_default())
    .bind(params.priority.unwrap_or_default())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Partial update. `None` fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskParams {
  pub title: Option<String>,
  pub description: Option<String>,
  pub status: Option<TaskStatus>,
  pub priority: Option<TaskPriority>,
  pub order_index: Option<i64>,
  /// When set, the write only applies if the stored version still matches.
  /// When absent the last write wins.
  pub expected_version: Option<i64>,
}

/// Applies a partial update to a task and bumps its version
///
/// # Errors
/// - ResourceNotFound if the task is not part of the project
/// - VersionConflict if `expected_version` no longer matches
pub async fn update(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid, params: UpdateTaskParams) -> ApiResult<Task> {
  ensure_task_exists(pool, ctx, id).await?;

  let updated = sqlx::query_as::<_, Task>(UPDATE_TASK)
    .bind(&params.title)
    .bind(&params.description)
    .bind(params.status)
    .bind(params.priority)
    .bind(params.order_index)
    .bind(Utc::now())
    .bind(id)
    .bind(params.expected_version)
    .fetch_optional(pool)
    .await?;

  match (updated, params.expected_version) {
    (Some(task), _) => Ok(task),
    (None, Some(expected)) => {
      let current = ensure_task_exists(pool, ctx, id).await?;
      Err(ApiError::VersionConflict {
        id,
        expected,
        actual: current.version,
      })
    },
    (None, None) => Err(ApiError::ResourceNotFound(id.to_string())),
  }
}

pub async fn delete(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid) -> ApiResult<()> {
  ensure_task_exists(pool, ctx, id).await?;

  sqlx::query(DELETE_TASK).bind(id).execute(pool).await?;

  Ok(())
}

async fn ensure_task_exists(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid) -> ApiResult<Task> {
  query::tasks::find(pool, ctx.project_id(), id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
