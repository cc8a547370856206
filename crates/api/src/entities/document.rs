use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
pub struct DocumentRow {
  pub id: Uuid,
  pub project_id: Uuid,
  pub phase_id: Option<Uuid>,
  pub name: String,
  pub doc_type: String,
  pub size: i64,
  pub content: String,
  pub tags: Json<Vec<String>>,
  pub is_latest: bool,
  pub uploaded_by: Uuid,
  pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Document {
  pub id: Uuid,
  pub project_id: Uuid,
  pub phase_id: Option<Uuid>,
  pub name: String,
  pub doc_type: String,
  pub size: i64,
  pub content: String,
  pub tags: Vec<String>,
  pub is_latest: bool,
  pub uploaded_by: Uuid,
  pub created_at: DateTime<Utc>,
}

/// Document listing entry without the content body.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct DocumentSummary {
  pub id: Uuid,
  pub phase_id: Option<Uuid>,
  pub name: String,
  pub doc_type: String,
  pub size: i64,
  pub tags: Vec<String>,
  pub is_latest: bool,
  pub created_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
  fn from(row: DocumentRow) -> Self {
    Self {
      id: row.id,
      project_id: row.project_id,
      phase_id: row.phase_id,
      name: row.name,
      doc_type: row.doc_type,
      size: row.size,
      content: row.content,
      tags: row.tags.0,
      is_latest: row.is_latest,
      uploaded_by: row.uploaded_by,
      created_at: row.created_at,
    }
  }
}

impl From<DocumentRow> for DocumentSummary {
  fn from(row: DocumentRow) -> Self {
    Self {
      id: row.id,
      phase_id: row.phase_id,
      name: row.name,
      doc_type: row.doc_type,
      size: row.size,
      tags: row.tags.0,
      is_latest: row.is_latest,
      created_at: row.created_at,
    }
  }
}
