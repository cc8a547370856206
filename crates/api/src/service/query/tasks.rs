use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::task::Task, error::ApiResult};

const LIST_PROJECT_TASKS: &str = r#"
  SELECT t.* FROM tasks AS t
  INNER JOIN phases AS ph ON t.phase_id = ph.id
  WHERE ph.project_id = ?1
  ORDER BY ph.order_index, t.order_index, t.created_at
"#;
const LIST_PHASE_TASKS: &str = r#"
  SELECT t.* FROM tasks AS t
  INNER JOIN phases AS ph ON t.phase_id = ph.id
  WHERE ph.project_id = ?1 AND t.phase_id = ?2
  ORDER BY t.order_index, t.created_at
"#;
const FIND_TASK: &str = r#"
  SELECT t.* FROM tasks AS t
  INNER JOIN phases AS ph ON t.phase_id = ph.id
  WHERE ph.project_id = ?1 AND t.id = ?2
"#;

/// Tasks of a project, optionally narrowed to one phase, in display order
pub async fn list(pool: &SqlitePool, project_id: Uuid, phase_id: Option<Uuid>) -> ApiResult<Vec<Task>> {
  let query = match phase_id {
    Some(phase_id) => sqlx::query_as::<_, Task>(LIST_PHASE_TASKS)
      .bind(project_id)
      .bind(phase_id),
    None => sqlx::query_as::<_, Task>(LIST_PROJECT_TASKS).bind(project_id),
  };

  query.fetch_all(pool).await.map_err(Into::into)
}

pub async fn find(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> ApiResult<Option<Task>> {
  sqlx::query_as::<_, Task>(FIND_TASK)
    .bind(project_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
