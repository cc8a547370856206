use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::deliverable::{Deliverable, DeliverableStatus, DeliverableType},
  error::{ApiError, ApiResult},
  service::query,
};

const INSERT_DELIVERABLE: &str = r#"
  INSERT INTO deliverables (id, phase_id, name, description, type, status, order_index)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, (SELECT COALESCE(MAX(order_index), 0) + 1 FROM deliverables WHERE phase_id = ?2))
  RETURNING *
"#;
const UPDATE_DELIVERABLE: &str = r#"
  UPDATE deliverables
  SET
    name = COALESCE(?1, name),
    description = COALESCE(?2, description),
    type = COALESCE(?3, type),
    status = COALESCE(?4, status),
    order_index = COALESCE(?5, order_index),
    version = version + 1,
    updated_at = ?6
  WHERE id = ?7 AND (?8 IS NULL OR version = ?8)
  RETURNING *
"#;
const DELETE_DELIVERABLE: &str = "DELETE FROM deliverables WHERE id = ?1";

#[derive(Debug, Deserialize)]
pub struct CreateDeliverableParams {
  pub phase_id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub r#type: Option<DeliverableType>,
  pub status: Option<DeliverableStatus>,
}

pub async fn create(
  pool: &SqlitePool,
  ctx: &ProjectContext,
  params: CreateDeliverableParams,
) -> ApiResult<Deliverable> {
  query::phases::find(pool, ctx.project_id(), params.phase_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(params.phase_id.to_string()))?;

  sqlx::query_as::<_, Deliverable>(INSERT_DELIVERABLE)
    .bind(Uuid::new_v4())
    .bind(params.phase_id)
    .bind(&params.name)
    .bind(params.description.unwrap_or_default())
    .bind(params.r#type.unwrap_or_default())
    .bind(params.status.unwrap_or_default())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDeliverableParams {
  pub name: Option<String>,
  pub description: Option<String>,
  pub r#type: Option<DeliverableType>,
  pub status: Option<DeliverableStatus>,
  pub order_index: Option<i64>,
  pub expected_version: Option<i64>,
}

/// Same contract as [`super::tasks::update`].
pub async fn update(
  pool: &SqlitePool,
  ctx: &ProjectContext,
  id: Uuid,
  params: UpdateDeliverableParams,
) -> ApiResult<Deliverable> {
  ensure_deliverable_exists(pool, ctx, id).await?;

  let updated = sqlx::query_as::<_, Deliverable>(UPDATE_DELIVERABLE)
    .bind(&params.name)
    .bind(&params.description)
    .bind(params.r#type)
    .bind(params.status)
    .bind(params.order_index)
    .bind(Utc::now())
    .bind(id)
    .bind(params.expected_version)
    .fetch_optional(pool)
    .await?;

  match (updated, params.expected_version) {
    (Some(deliverable), _) => Ok(deliverable),
    (None, Some(expected)) => {
      let current = ensure_deliverable_exists(pool, ctx, id).await?;
      Err(ApiError::VersionConflict {
        id,
        expected,
        actual: current.version,
      })
    },
    (None, None) => Err(ApiError::ResourceNotFound(id.to_string())),
  }
}

pub async fn delete(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid) -> ApiResult<()> {
  ensure_deliverable_exists(pool, ctx, id).await?;

  sqlx::query(DELETE_DELIVERABLE).bind(id).execute(pool).await?;

  Ok(())
}

async fn ensure_deliverable_exists(pool: &SqlitePool, ctx: &ProjectContext, id: Uuid) -> ApiResult<Deliverable> {
  query::deliverables::find(pool, ctx.project_id(), id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
