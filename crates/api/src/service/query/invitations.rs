use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::{
  entities::invitation::{InvitationPreview, InvitationRow},
  error::ApiResult,
};

const LIST_INVITATIONS: &str = "SELECT * FROM project_invitations WHERE project_id = ?1 ORDER BY created_at, id";
const FIND_INVITATION_BY_TOKEN: &str = "SELECT * FROM project_invitations WHERE token = ?1";
const PREVIEW_INVITATION: &str = r#"
  SELECT
    i.project_id,
    i.email,
    i.role,
    i.expires_at,
    p.name as project_name,
    u.display_name as inviter_name
  FROM project_invitations AS i
  INNER JOIN projects AS p ON i.project_id = p.id
  INNER JOIN users AS u ON i.invited_by = u.id
  WHERE i.token = ?1
"#;

/// Every invitation of a project, expired ones included
pub async fn list(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<InvitationRow>> {
  sqlx::query_as::<_, InvitationRow>(LIST_INVITATIONS)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_token(pool: &SqlitePool, token: &str) -> ApiResult<Option<InvitationRow>> {
  sqlx::query_as::<_, InvitationRow>(FIND_INVITATION_BY_TOKEN)
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Public view of an invitation, looked up by its token
pub async fn preview(pool: &SqlitePool, token: &str) -> ApiResult<Option<InvitationPreview>> {
  sqlx::query(PREVIEW_INVITATION)
    .bind(token)
    .map(map_preview)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

fn map_preview(row: SqliteRow) -> InvitationPreview {
  let expires_at = row.get("expires_at");

  InvitationPreview {
    project_id: row.get("project_id"),
    project_name: row.get("project_name"),
    inviter_name: row.get("inviter_name"),
    email: row.get("email"),
    role: row.get("role"),
    expires_at,
    is_expired: Utc::now() > expires_at,
  }
}
