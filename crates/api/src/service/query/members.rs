use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use uuid::Uuid;

use crate::{
  entities::member::{effective_scopes, Member, MemberRow, Scope},
  error::ApiResult,
};

const FIND_MEMBER: &str = "SELECT * FROM project_members WHERE project_id = ?1 AND user_id = ?2";
const LIST_MEMBERS: &str = r#"
  SELECT
    m.id as member_id,
    m.project_id as member_project_id,
    m.user_id as member_user_id,
    m.role as member_role,
    m.scopes as member_scopes,
    m.created_at as member_created_at,
    m.updated_at as member_updated_at,
    u.email as user_email,
    u.display_name as user_display_name
  FROM project_members AS m
  INNER JOIN users AS u ON m.user_id = u.id
  WHERE m.project_id = ?1
  ORDER BY m.created_at, m.id
"#;

pub async fn find(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> ApiResult<Option<MemberRow>> {
  sqlx::query_as::<_, MemberRow>(FIND_MEMBER)
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Lists every member of a project with their account details
pub async fn list(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<Member>> {
  sqlx::query(LIST_MEMBERS)
    .bind(project_id)
    .map(map_member)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

fn map_member(row: SqliteRow) -> Member {
  let Json(scopes): Json<Vec<Scope>> = row.get("member_scopes");
  let role = row.get("member_role");

  Member {
    id: row.get("member_id"),
    project_id: row.get("member_project_id"),
    user_id: row.get("member_user_id"),
    email: row.get("user_email"),
    display_name: row.get("user_display_name"),
    role,
    effective_scopes: effective_scopes(role, &scopes),
    scopes,
    created_at: row.get("member_created_at"),
    updated_at: row.get("member_updated_at"),
  }
}
