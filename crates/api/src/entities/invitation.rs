use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

use super::member::{AssignableRole, Scope};

#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
pub struct InvitationRow {
  pub id: Uuid,
  pub project_id: Uuid,
  pub email: String,
  pub token: String,
  pub role: AssignableRole,
  pub scopes: Json<Vec<Scope>>,
  pub invited_by: Uuid,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

impl InvitationRow {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Invitation {
  pub id: Uuid,
  pub project_id: Uuid,
  pub email: String,
  pub token: String,
  pub role: AssignableRole,
  pub scopes: Vec<Scope>,
  pub invited_by: Uuid,
  pub expires_at: DateTime<Utc>,
  pub is_expired: bool,
  pub created_at: DateTime<Utc>,
}

impl From<InvitationRow> for Invitation {
  fn from(row: InvitationRow) -> Self {
    let is_expired = row.is_expired(Utc::now());

    Self {
      id: row.id,
      project_id: row.project_id,
      email: row.email,
      token: row.token,
      role: row.role,
      scopes: row.scopes.0,
      invited_by: row.invited_by,
      expires_at: row.expires_at,
      is_expired,
      created_at: row.created_at,
    }
  }
}

/// What the invitee sees when opening the invitation link, before accepting.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct InvitationPreview {
  pub project_id: Uuid,
  pub project_name: String,
  pub inviter_name: String,
  pub email: String,
  pub role: AssignableRole,
  pub expires_at: DateTime<Utc>,
  pub is_expired: bool,
}
