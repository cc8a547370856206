use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeliverableType {
  #[default]
  Document,
  Design,
  Code,
  Other,
}

impl fmt::Display for DeliverableType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      DeliverableType::Document => write!(f, "document"),
      DeliverableType::Design => write!(f, "design"),
      DeliverableType::Code => write!(f, "code"),
      DeliverableType::Other => write!(f, "other"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum DeliverableStatus {
  #[default]
  Pending,
  InProgress,
  Completed,
}

impl fmt::Display for DeliverableStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      DeliverableStatus::Pending => write!(f, "pending"),
      DeliverableStatus::InProgress => write!(f, "in-progress"),
      DeliverableStatus::Completed => write!(f, "completed"),
    }
  }
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Deliverable {
  pub id: Uuid,
  pub phase_id: Uuid,
  pub name: String,
  pub description: String,
  pub r#type: DeliverableType,
  pub status: DeliverableStatus,
  pub order_index: i64,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
