use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Phase {
  pub id: Uuid,
  pub project_id: Uuid,
  pub name: String,
  pub order_index: i64,
  pub created_at: DateTime<Utc>,
}

/// Phase with task and deliverable completion counters.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct PhaseSummary {
  pub id: Uuid,
  pub project_id: Uuid,
  pub name: String,
  pub order_index: i64,
  pub total_tasks: i64,
  pub completed_tasks: i64,
  pub total_deliverables: i64,
  pub completed_deliverables: i64,
  pub created_at: DateTime<Utc>,
}

impl PhaseSummary {
  /// Completed tasks as a whole percentage, 0 for a phase without tasks.
  pub fn progress(&self) -> u8 {
    if self.total_tasks == 0 {
      return 0;
    }

    ((self.completed_tasks * 100) / self.total_tasks) as u8
  }
}
