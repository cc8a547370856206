use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MemberRole {
  Owner,
  Admin,
  Member,
}

impl MemberRole {
  /// Owners and admins may manage members and invitations.
  pub fn can_manage(self) -> bool {
    matches!(self, MemberRole::Owner | MemberRole::Admin)
  }
}

impl fmt::Display for MemberRole {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      MemberRole::Owner => write!(f, "owner"),
      MemberRole::Admin => write!(f, "admin"),
      MemberRole::Member => write!(f, "member"),
    }
  }
}

/// Role that can be granted through an invitation or a role change.
/// The owner role is fixed at project creation and never assignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AssignableRole {
  Admin,
  #[default]
  Member,
}

impl From<AssignableRole> for MemberRole {
  fn from(role: AssignableRole) -> Self {
    match role {
      AssignableRole::Admin => MemberRole::Admin,
      AssignableRole::Member => MemberRole::Member,
    }
  }
}

impl fmt::Display for AssignableRole {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    MemberRole::from(*self).fmt(f)
  }
}

/// Capability tag attached to a member or invitation, one per phase plus documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
  Requirements,
  BasicDesign,
  ExternalDesign,
  DevelopmentPrep,
  Documents,
}

impl Scope {
  pub const ALL: [Scope; 5] = [
    Scope::Requirements,
    Scope::BasicDesign,
    Scope::ExternalDesign,
    Scope::DevelopmentPrep,
    Scope::Documents,
  ];
}

/// Scopes a role actually holds. Owners and admins hold every scope
/// regardless of what is stored on the row.
pub fn effective_scopes(role: MemberRole, stored: &[Scope]) -> Vec<Scope> {
  if role.can_manage() {
    return Scope::ALL.to_vec();
  }

  let mut scopes = stored.to_vec();
  scopes.sort();
  scopes.dedup();
  scopes
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
pub struct MemberRow {
  pub id: Uuid,
  pub project_id: Uuid,
  pub user_id: Uuid,
  pub role: MemberRole,
  pub scopes: Json<Vec<Scope>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Member {
  pub id: Uuid,
  pub project_id: Uuid,
  pub user_id: Uuid,
  pub email: String,
  pub display_name: String,
  pub role: MemberRole,
  pub scopes: Vec<Scope>,
  pub effective_scopes: Vec<Scope>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_admin_holds_every_scope() {
    assert_eq!(effective_scopes(MemberRole::Admin, &[]), Scope::ALL.to_vec());
    assert_eq!(
      effective_scopes(MemberRole::Owner, &[Scope::Documents]),
      Scope::ALL.to_vec()
    );
  }

  #[test]
  fn test_member_holds_stored_scopes() {
    assert_eq!(
      effective_scopes(MemberRole::Member, &[Scope::Documents, Scope::Requirements, Scope::Documents]),
      vec![Scope::Requirements, Scope::Documents]
    );
    assert!(effective_scopes(MemberRole::Member, &[]).is_empty());
  }

  #[test]
  fn test_owner_is_not_assignable() {
    assert!(serde_json::from_str::<AssignableRole>("\"owner\"").is_err());
    assert_eq!(MemberRole::from(AssignableRole::Admin), MemberRole::Admin);
  }
}
