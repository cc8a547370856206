use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{member::MemberRole, user::User};

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct ProjectRow {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub owner_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Project {
  pub id: Uuid,
  pub name: String,
  pub description: String,
  pub owner: User,
  /// Role of the requesting user in this project.
  pub role: MemberRole,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
