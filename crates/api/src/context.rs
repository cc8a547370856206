use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::{member::MemberRow, project::ProjectRow, user::User},
  error::{ApiError, ApiResult},
  service::query,
};

/// The project a request operates on, together with who is acting on it.
///
/// Every project-scoped service function takes a context instead of a bare
/// project id, so membership is established once per request.
#[derive(Debug, Clone)]
pub struct ProjectContext {
  pub project: ProjectRow,
  pub actor: User,
  pub membership: MemberRow,
}

impl ProjectContext {
  /// Loads the project and the actor's membership. Non-members are rejected.
  pub async fn resolve(pool: &SqlitePool, project_id: Uuid, actor: User) -> ApiResult<Self> {
    let project = query::projects::find_by_id(pool, project_id)
      .await?
      .ok_or_else(|| ApiError::ResourceNotFound(project_id.to_string()))?;

    let membership = query::members::find(pool, project_id, actor.id)
      .await?
      .ok_or(ApiError::PermissionDenied("you are not a member of this project"))?;

    Ok(Self {
      project,
      actor,
      membership,
    })
  }

  pub fn project_id(&self) -> Uuid {
    self.project.id
  }

  pub fn actor_id(&self) -> Uuid {
    self.actor.id
  }
}
