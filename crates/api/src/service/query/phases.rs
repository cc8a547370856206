use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::phase::{Phase, PhaseSummary},
  error::ApiResult,
};

const LIST_PHASES: &str = "SELECT * FROM phases WHERE project_id = ?1 ORDER BY order_index";
const FIND_PHASE: &str = "SELECT * FROM phases WHERE project_id = ?1 AND id = ?2";
const LIST_PHASE_SUMMARIES: &str = r#"
  SELECT
    ph.id,
    ph.project_id,
    ph.name,
    ph.order_index,
    ph.created_at,
    (SELECT COUNT(*) FROM tasks AS t WHERE t.phase_id = ph.id) AS total_tasks,
    (SELECT COUNT(*) FROM tasks AS t WHERE t.phase_id = ph.id AND t.status = 'completed') AS completed_tasks,
    (SELECT COUNT(*) FROM deliverables AS d WHERE d.phase_id = ph.id) AS total_deliverables,
    (SELECT COUNT(*) FROM deliverables AS d WHERE d.phase_id = ph.id AND d.status = 'completed') AS completed_deliverables
  FROM phases AS ph
  WHERE ph.project_id = ?1
  ORDER BY ph.order_index
"#;

pub async fn list(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<Phase>> {
  sqlx::query_as::<_, Phase>(LIST_PHASES)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Phases of a project with task and deliverable completion counters
pub async fn list_summaries(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<PhaseSummary>> {
  sqlx::query_as::<_, PhaseSummary>(LIST_PHASE_SUMMARIES)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn find(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> ApiResult<Option<Phase>> {
  sqlx::query_as::<_, Phase>(FIND_PHASE)
    .bind(project_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
