use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::user::User, error::ApiResult};

const FIND_USER_BY_ID_QUERY: &str = "SELECT * FROM users WHERE id = ?1";
const FIND_USER_BY_EMAIL_QUERY: &str = "SELECT * FROM users WHERE email = ?1";

/// Finds a user by their ID
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `id` - User UUID to search for
///
/// # Returns
/// Optional User if found
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<User>> {
  sqlx::query_as::<_, User>(FIND_USER_BY_ID_QUERY)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> ApiResult<Option<User>> {
  sqlx::query_as::<_, User>(FIND_USER_BY_EMAIL_QUERY)
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
