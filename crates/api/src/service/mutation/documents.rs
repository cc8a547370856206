use chrono::Utc;
use serde::Deserialize;
use sqlx::{types::Json, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::document::DocumentRow,
  error::{ApiError, ApiResult},
  service::query,
};

const MARK_PREVIOUS_VERSIONS: &str = r#"
  UPDATE documents SET is_latest = FALSE
  WHERE project_id = ?1 AND name = ?2 AND is_latest = TRUE
"#;
const INSERT_DOCUMENT: &str = r#"
  INSERT INTO documents (id, project_id, phase_id, name, doc_type, size, content, tags, is_latest, uploaded_by, created_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, TRUE, ?9, ?10)
  RETURNING *
"#;
const DELETE_DOCUMENT: &str = "DELETE FROM documents WHERE id = ?1";
const PROMOTE_LATEST: &str = r#"
  UPDATE documents SET is_latest = TRUE
  WHERE id = (
    SELECT id FROM documents WHERE project_id = ?1 AND name = ?2
    ORDER BY created_at DESC LIMIT 1
  )
"#;

#[derive(Debug, Deserialize)]
pub struct UploadDocumentParams {
  pub name: String,
  pub doc_type: String,
  pub content: String,
  #[serde(default)]
  pub tags: Vec<String>,
  pub phase_id: Option<Uuid>,
}

/// Stores a new document version
///
/// Uploading under an existing name keeps the earlier rows as history and
/// makes the new row the only latest one.
///
/// # Errors
/// - ResourceNotFound if `phase_id` is not a phase of the project
pub async fn upload(pool: &SqlitePool, ctx: &ProjectContext, params: UploadDocumentParams) -> ApiResult<DocumentRow> {
  if let Some(phase_id) = params.phase_id {
    query::phases::find(pool, ctx.project_id(), phase_id)
      .await?
      .ok_or_else(|| ApiError::ResourceNotFound(phase_id.to_string()))?;
  }

  let mut tx = pool.begin().await?;

  let superseded = sqlx::query(MARK_PREVIOUS_VERSIONS)
    .bind(ctx.project_id())
    .bind(&params.name)
    .execute(&mut *tx)
    .await?
    .rows_affected();

  let document = sqlx::query_as::<_, DocumentRow>(INSERT_DOCUMENT)
    .bind(Uuid::new_v4())
    .bind(ctx.project_id())
    .bind(params.phase_id)
    .bind(&params.name)
    .bind(&params.doc_type)
    .bind(params.content.len() as i64)
    .bind(&params.content)
    .bind(Json(params.tags))
    .bind(ctx.actor_id())
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

  tx.commit().await?;

  info!(
    project_id = %ctx.project_id(),
    document_id = %document.id,
    size = document.size,
    superseded,
    "Uploaded document"
  );

  Ok(document)
}

/// Deletes one document version. When the latest version goes, the newest
/// remaining version of that name becomes latest.
pub async fn delete(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid) -> ApiResult<()> {
  let document = query::documents::find(pool, ctx.project_id(), id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let mut tx = pool.begin().await?;

  sqlx::query(DELETE_DOCUMENT).bind(id).execute(&mut *tx).await?;

  if document.is_latest {
    sqlx::query(PROMOTE_LATEST)
      .bind(ctx.project_id())
      .bind(&document.name)
      .execute(&mut *tx)
      .await?;
  }

  tx.commit().await?;

  Ok(())
}
