use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::phase::Phase,
  error::ApiResult,
  service::{
    catalog::{self, PhaseTemplate},
    query,
  },
};

const INSERT_PHASE_IF_MISSING: &str = r#"
  INSERT INTO phases (id, project_id, name, order_index)
  VALUES (?1, ?2, ?3, ?4)
  ON CONFLICT (project_id, order_index) DO NOTHING
  RETURNING id
"#;
const INSERT_TASK_IF_MISSING: &str = r#"
  INSERT INTO tasks (id, phase_id, title, description, priority, order_index)
  SELECT ?1, ?2, ?3, ?4, ?5, ?6
  WHERE NOT EXISTS (SELECT 1 FROM tasks WHERE phase_id = ?2 AND title = ?3)
"#;
const INSERT_DELIVERABLE_IF_MISSING: &str = r#"
  INSERT INTO deliverables (id, phase_id, name, description, type, order_index)
  SELECT ?1, ?2, ?3, ?4, ?5, ?6
  WHERE NOT EXISTS (SELECT 1 FROM deliverables WHERE phase_id = ?2 AND name = ?3)
"#;

/// Rows written by one seeding pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
  pub phases: u64,
  pub tasks: u64,
  pub deliverables: u64,
}

/// Phases of a project after [`ensure_phases`].
#[derive(Debug, Clone)]
pub struct EnsuredPhases {
  pub phases: Vec<Phase>,
  /// True when this call created the phases.
  pub seeded: bool,
}

/// Seeds the four canonical phases and their catalogue items when the
/// project has none yet, then returns the phases in order.
///
/// Every phase insert skips an existing order index, so a project that
/// already has its phases is left untouched. The insert is also the first
/// statement of the transaction: concurrent first loads queue on the write
/// lock and the later one finds the phases already there.
pub async fn ensure_phases(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<EnsuredPhases> {
  let mut tx = pool.begin().await?;
  let mut report = SeedReport::default();

  for template in &catalog::PHASES {
    let inserted = sqlx::query_scalar::<_, Uuid>(INSERT_PHASE_IF_MISSING)
      .bind(Uuid::new_v4())
      .bind(ctx.project_id())
      .bind(template.name)
      .bind(template.order_index)
      .fetch_optional(&mut *tx)
      .await?;

    let Some(phase_id) = inserted else {
      continue;
    };
    report.phases += 1;

    let (tasks, deliverables) = insert_missing_items(&mut tx, phase_id, template).await?;
    report.tasks += tasks;
    report.deliverables += deliverables;
  }

  tx.commit().await?;

  if report.phases > 0 {
    info!(project_id = %ctx.project_id(), ?report, "Seeded canonical phases");
  }

  Ok(EnsuredPhases {
    phases: query::phases::list(pool, ctx.project_id()).await?,
    seeded: report.phases > 0,
  })
}

/// Inserts every catalogue task and deliverable missing from the project's
/// phases. Items are matched by phase and title, so repeated calls never
/// create duplicates. Phases that are not in the catalogue are skipped.
pub async fn create_missing_items(pool: &SqlitePool, ctx: &ProjectContext) -> ApiResult<SeedReport> {
  let phases = query::phases::list(pool, ctx.project_id()).await?;
  let mut report = SeedReport::default();

  let mut tx = pool.begin().await?;

  for phase in &phases {
    let Some(template) = catalog::phase_template(&phase.name) else {
      debug!(phase_id = %phase.id, name = %phase.name, "Phase has no catalogue entry");
      continue;
    };

    let (tasks, deliverables) = insert_missing_items(&mut tx, phase.id, template).await?;
    report.tasks += tasks;
    report.deliverables += deliverables;
  }

  tx.commit().await?;

  debug!(project_id = %ctx.project_id(), ?report, "Created missing catalogue items");

  Ok(report)
}

async fn insert_missing_items(
  conn: &mut SqliteConnection,
  phase_id: Uuid,
  template: &PhaseTemplate,
) -> ApiResult<(u64, u64)> {
  let mut tasks = 0;
  let mut deliverables = 0;

  for (index, task) in template.tasks.iter().enumerate() {
    tasks += sqlx::query(INSERT_TASK_IF_MISSING)
      .bind(Uuid::new_v4())
      .bind(phase_id)
      .bind(task.title)
      .bind(task.description)
      .bind(task.priority)
      .bind(index as i64 + 1)
      .execute(&mut *conn)
      .await?
      .rows_affected();
  }

  for (index, deliverable) in template.deliverables.iter().enumerate() {
    deliverables += sqlx::query(INSERT_DELIVERABLE_IF_MISSING)
      .bind(Uuid::new_v4())
      .bind(phase_id)
      .bind(deliverable.name)
      .bind(deliverable.description)
      .bind(deliverable.r#type)
      .bind(index as i64 + 1)
      .execute(&mut *conn)
      .await?
      .rows_affected();
  }

  Ok((tasks, deliverables))
}
