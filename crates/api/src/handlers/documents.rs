use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
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
    document::{Document, DocumentRow, DocumentSummary},
    user::User,
  },
  error::{ApiError, ApiResult},
  notifier::{Action, ChangeNotifier, Entity},
  service::{mutation, query},
  AppJson, AppState,
};

const DOCUMENTS_TAG: &str = "documents";

pub fn init_documents_routes() -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_documents, upload_document))
    .routes(routes!(get_document, delete_document))
    .routes(routes!(download_document))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListDocumentsParams {
  /// Hide superseded versions
  latest_only: Option<bool>,
}

#[utoipa::path(
  get,
  path = "/{project_id}/documents",
  tag = DOCUMENTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ListDocumentsParams
  ),
  responses(
    (status = 200, description = "Documents without their content", body = [DocumentSummary])
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id))]
async fn list_documents(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  Query(params): Query<ListDocumentsParams>,
) -> ApiResult<Json<Vec<DocumentSummary>>> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;

  let documents = query::documents::list(&pool, ctx.project_id(), params.latest_only.unwrap_or(false))
    .await?
    .into_iter()
    .map(DocumentSummary::from)
    .collect();

  Ok(Json(documents))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UploadDocument {
  #[validate(length(min = 1, max = 255))]
  name: String,
  #[validate(length(min = 1, max = 100))]
  doc_type: String,
  content: String,
  #[serde(default)]
  tags: Vec<String>,
  phase_id: Option<Uuid>,
}

#[utoipa::path(
  post,
  path = "/{project_id}/documents",
  tag = DOCUMENTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id")
  ),
  request_body = UploadDocument,
  responses(
    (status = 201, description = "Document stored as the latest version of its name", body = Document),
    (status = 400, description = "Validation error"),
    (status = 404, description = "Phase not found")
  )
)]
#[instrument(skip(pool, notifier, user, input), fields(project_id = %project_id))]
async fn upload_document(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path(project_id): Path<Uuid>,
  AppJson(input): AppJson<UploadDocument>,
) -> ApiResult<(StatusCode, Json<Document>)> {
  debug!(name = %input.name, doc_type = %input.doc_type, "Upload document");

  input.validate()?;

  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  let document = mutation::documents::upload(
    &pool,
    &ctx,
    mutation::documents::UploadDocumentParams {
      name: input.name,
      doc_type: input.doc_type,
      content: input.content,
      tags: input.tags,
      phase_id: input.phase_id,
    },
  )
  .await?;

  notifier.publish(project_id, Entity::Document, Action::Created);

  Ok((StatusCode::CREATED, Json(document.into())))
}

#[utoipa::path(
  get,
  path = "/{project_id}/documents/{document_id}",
  tag = DOCUMENTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("document_id" = Uuid, Path, description = "Document id")
  ),
  responses(
    (status = 200, description = "Document with its content", body = Document),
    (status = 404, description = "Document not found")
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id, document_id = %document_id))]
async fn get_document(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path((project_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Document>> {
  let document = find_document(&pool, project_id, document_id, user).await?;

  Ok(Json(document.into()))
}

#[utoipa::path(
  get,
  path = "/{project_id}/documents/{document_id}/download",
  tag = DOCUMENTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("document_id" = Uuid, Path, description = "Document id")
  ),
  responses(
    (status = 200, description = "Raw document content as an attachment", body = String, content_type = "text/plain"),
    (status = 404, description = "Document not found")
  )
)]
#[instrument(skip(pool, user), fields(project_id = %project_id, document_id = %document_id))]
async fn download_document(
  State(pool): State<Arc<SqlitePool>>,
  Extension(user): Extension<User>,
  Path((project_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
  let document = find_document(&pool, project_id, document_id, user).await?;

  let disposition = format!("attachment; filename=\"{}\"", attachment_name(&document.name));

  Ok((
    [
      (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    document.content,
  ))
}

#[utoipa::path(
  delete,
  path = "/{project_id}/documents/{document_id}",
  tag = DOCUMENTS_TAG,
  params(
    ("project_id" = Uuid, Path, description = "Project id"),
    ("document_id" = Uuid, Path, description = "Document id")
  ),
  responses(
    (status = 204, description = "Document deleted"),
    (status = 404, description = "Document not found")
  )
)]
#[instrument(skip(pool, notifier, user), fields(project_id = %project_id, document_id = %document_id))]
async fn delete_document(
  State(pool): State<Arc<SqlitePool>>,
  State(notifier): State<ChangeNotifier>,
  Extension(user): Extension<User>,
  Path((project_id, document_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
  let ctx = ProjectContext::resolve(&pool, project_id, user).await?;
  mutation::documents::delete(&pool, &ctx, document_id).await?;

  notifier.publish(project_id, Entity::Document, Action::Deleted);

  Ok(StatusCode::NO_CONTENT)
}

async fn find_document(pool: &SqlitePool, project_id: Uuid, document_id: Uuid, user: User) -> ApiResult<DocumentRow> {
  let ctx = ProjectContext::resolve(pool, project_id, user).await?;

  query::documents::find(pool, ctx.project_id(), document_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(document_id.to_string()))
}

/// Header-safe file name. Anything outside printable ASCII, quotes and
/// backslashes become underscores.
fn attachment_name(name: &str) -> String {
  name
    .chars()
    .map(|c| if c == '"' || c == '\\' || !c.is_ascii() || c.is_ascii_control() { '_' } else { c })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_attachment_name() {
    assert_eq!(attachment_name("spec v2.md"), "spec v2.md");
    assert_eq!(attachment_name("a\"b\\c\nd"), "a_b_c_d");
    assert_eq!(attachment_name("設計.md"), "__.md");
  }
}
