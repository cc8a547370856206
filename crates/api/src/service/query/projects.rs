use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::{
  entities::{
    project::{Project, ProjectRow},
    user::User,
  },
  error::ApiResult,
};

use super::calculate_total_pages;

const FIND_PROJECT_BY_ID: &str = "SELECT * FROM projects WHERE id = ?1";
const COUNT_MEMBER_PROJECTS: &str = "SELECT COUNT(*) FROM project_members WHERE user_id = ?1";
const PROJECT_WITH_OWNER_COLUMNS: &str = r#"
  SELECT
    p.id as project_id,
    p.name as project_name,
    p.description as project_description,
    p.created_at as project_created_at,
    p.updated_at as project_updated_at,
    m.role as member_role,
    u.id as user_id,
    u.email as user_email,
    u.display_name as user_display_name,
    u.password as user_password,
    u.created_at as user_created_at,
    u.updated_at as user_updated_at
  FROM projects AS p
  INNER JOIN project_members AS m ON m.project_id = p.id
  INNER JOIN users AS u ON p.owner_id = u.id
"#;

/// Fetches a paginated list of projects the user is a member of
///
/// # Arguments
/// * `pool` - The database connection pool
/// * `user_id` - The member whose projects are listed
/// * `page` - The page number (1-based)
/// * `limit` - The number of items per page
///
/// # Returns
/// A tuple containing the projects and the total number of pages
pub async fn list(pool: &SqlitePool, user_id: Uuid, page: i64, limit: i64) -> ApiResult<(Vec<Project>, i64)> {
  let (total_count, projects) = tokio::try_join!(
    get_total_count(pool, user_id),
    fetch_projects(pool, user_id, page, limit)
  )?;

  let total_pages = calculate_total_pages(total_count, limit);

  Ok((projects, total_pages))
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<ProjectRow>> {
  sqlx::query_as::<_, ProjectRow>(FIND_PROJECT_BY_ID)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Fetches a single project as seen by one of its members
pub async fn find_for_member(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> ApiResult<Option<Project>> {
  let query = format!("{PROJECT_WITH_OWNER_COLUMNS} WHERE p.id = ?1 AND m.user_id = ?2");

  sqlx::query(&query)
    .bind(id)
    .bind(user_id)
    .map(map_row_to_project)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

async fn fetch_projects(pool: &SqlitePool, user_id: Uuid, page: i64, limit: i64) -> ApiResult<Vec<Project>> {
  let offset = (page.max(1) - 1) * limit;
  let query = format!("{PROJECT_WITH_OWNER_COLUMNS} WHERE m.user_id = ?1 ORDER BY p.created_at, p.id LIMIT ?2 OFFSET ?3");

  sqlx::query(&query)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .map(map_row_to_project)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

async fn get_total_count(pool: &SqlitePool, user_id: Uuid) -> ApiResult<i64> {
  let (count,): (i64,) = sqlx::query_as(COUNT_MEMBER_PROJECTS)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
  Ok(count)
}

fn map_row_to_project(row: SqliteRow) -> Project {
  Project {
    id: row.get("project_id"),
    name: row.get("project_name"),
    description: row.get("project_description"),
    owner: User {
      id: row.get("user_id"),
      email: row.get("user_email"),
      display_name: row.get("user_display_name"),
      password: row.get("user_password"),
      created_at: row.get("user_created_at"),
      updated_at: row.get("user_updated_at"),
    },
    role: row.get("member_role"),
    created_at: row.get("project_created_at"),
    updated_at: row.get("project_updated_at"),
  }
}
