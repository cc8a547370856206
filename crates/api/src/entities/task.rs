use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  Completed,
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TaskStatus::Todo => write!(f, "todo"),
      TaskStatus::InProgress => write!(f, "in-progress"),
      TaskStatus::Completed => write!(f, "completed"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskPriority {
  High,
  #[default]
  Medium,
  Low,
}

impl fmt::Display for TaskPriority {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TaskPriority::High => write!(f, "high"),
      TaskPriority::Medium => write!(f, "medium"),
      TaskPriority::Low => write!(f, "low"),
    }
  }
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Task {
  pub id: Uuid,
  pub phase_id: Uuid,
  pub title: String,
  pub description: String,
  pub status: TaskStatus,
  pub priority: TaskPriority,
  pub order_index: i64,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_wire_names() {
    assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in-progress\"");
    assert_eq!(
      serde_json::from_str::<TaskStatus>("\"completed\"").unwrap(),
      TaskStatus::Completed
    );
    assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
    assert!(serde_json::from_str::<TaskStatus>("\"done\"").is_err());
  }
}
