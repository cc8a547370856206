use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::deliverable::Deliverable, error::ApiResult};

const LIST_PROJECT_DELIVERABLES: &str = r#"
  SELECT d.* FROM deliverables AS d
  INNER JOIN phases AS ph ON d.phase_id = ph.id
  WHERE ph.project_id = ?1
  ORDER BY ph.order_index, d.order_index, d.created_at
"#;
const LIST_PHASE_DELIVERABLES: &str = r#"
  SELECT d.* FROM deliverables AS d
  INNER JOIN phases AS ph ON d.phase_id = ph.id
  WHERE ph.project_id = ?1 AND d.phase_id = ?2
  ORDER BY d.order_index, d.created_at
"#;
const FIND_DELIVERABLE: &str = r#"
  SELECT d.* FROM deliverables AS d
  INNER JOIN phases AS ph ON d.phase_id = ph.id
  WHERE ph.project_id = ?1 AND d.id = ?2
"#;

/// Deliverables of a project, optionally narrowed to one phase, in display order
pub async fn list(pool: &SqlitePool, project_id: Uuid, phase_id: Option<Uuid>) -> ApiResult<Vec<Deliverable>> {
  let query = match phase_id {
    Some(phase_id) => sqlx::query_as::<_, Deliverable>(LIST_PHASE_DELIVERABLES)
      .bind(project_id)
      .bind(phase_id),
    None => sqlx::query_as::<_, Deliverable>(LIST_PROJECT_DELIVERABLES).bind(project_id),
  };

  query.fetch_all(pool).await.map_err(Into::into)
}

pub async fn find(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> ApiResult<Option<Deliverable>> {
  sqlx::query_as::<_, Deliverable>(FIND_DELIVERABLE)
    .bind(project_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
