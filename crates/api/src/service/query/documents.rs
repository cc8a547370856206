use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::document::DocumentRow, error::ApiResult};

const LIST_DOCUMENTS: &str = r#"
  SELECT * FROM documents
  WHERE project_id = ?1 AND (?2 = 0 OR is_latest = 1)
  ORDER BY name, created_at DESC
"#;
const FIND_DOCUMENT: &str = "SELECT * FROM documents WHERE project_id = ?1 AND id = ?2";

/// Documents of a project, newest version first within each name
pub async fn list(pool: &SqlitePool, project_id: Uuid, latest_only: bool) -> ApiResult<Vec<DocumentRow>> {
  sqlx::query_as::<_, DocumentRow>(LIST_DOCUMENTS)
    .bind(project_id)
    .bind(latest_only)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn find(pool: &SqlitePool, project_id: Uuid, id: Uuid) -> ApiResult<Option<DocumentRow>> {
  sqlx::query_as::<_, DocumentRow>(FIND_DOCUMENT)
    .bind(project_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
