use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::{
  context::ProjectContext,
  entities::{
    deliverable::{Deliverable, DeliverableStatus},
    phase::Phase,
    task::{Task, TaskStatus},
  },
  error::ApiResult,
  notifier::ChangeEvent,
  service::{
    mutation::{
      self,
      deliverables::UpdateDeliverableParams,
      tasks::UpdateTaskParams,
    },
    query,
  },
};

/// In-memory copy of one project's phases, tasks and deliverables.
///
/// Writes go to the database first and are reflected locally only after
/// they succeed. Change events for the mirrored project trigger a full
/// re-fetch.
#[derive(Debug, Clone)]
pub struct ProjectMirror {
  ctx: ProjectContext,
  phases: Vec<Phase>,
  tasks: Vec<Task>,
  deliverables: Vec<Deliverable>,
  seeded: bool,
}

impl ProjectMirror {
  /// Seeds the canonical phases if the project has none, then fetches
  /// everything.
  pub async fn load(pool: &SqlitePool, ctx: ProjectContext) -> ApiResult<Self> {
    let seeded = mutation::phases::ensure_phases(pool, &ctx).await?.seeded;

    let mut mirror = Self {
      ctx,
      phases: Vec::new(),
      tasks: Vec::new(),
      deliverables: Vec::new(),
      seeded,
    };
    mirror.refresh(pool).await?;

    Ok(mirror)
  }

  pub async fn refresh(&mut self, pool: &SqlitePool) -> ApiResult<()> {
    let project_id = self.ctx.project_id();

    let (phases, tasks, deliverables) = tokio::try_join!(
      query::phases::list(pool, project_id),
      query::tasks::list(pool, project_id, None),
      query::deliverables::list(pool, project_id, None),
    )?;

    self.phases = dedup_by_id(phases, |phase| phase.id);
    self.tasks = dedup_by_id(tasks, |task| task.id);
    self.deliverables = dedup_by_id(deliverables, |deliverable| deliverable.id);
    self.sort();

    debug!(
      project_id = %project_id,
      phases = self.phases.len(),
      tasks = self.tasks.len(),
      deliverables = self.deliverables.len(),
      "Refreshed project mirror"
    );

    Ok(())
  }

  pub async fn update_task(&mut self, pool: &SqlitePool, id: Uuid, params: UpdateTaskParams) -> ApiResult<Task> {
    let task = mutation::tasks::update(pool, &self.ctx, id, params).await?;

    match self.tasks.iter_mut().find(|local| local.id == id) {
      Some(local) => *local = task.clone(),
      None => self.tasks.push(task.clone()),
    }
    self.sort();

    Ok(task)
  }

  pub async fn update_deliverable(
    &mut self,
    pool: &SqlitePool,
    id: Uuid,
    params: UpdateDeliverableParams,
  ) -> ApiResult<Deliverable> {
    let deliverable = mutation::deliverables::update(pool, &self.ctx, id, params).await?;

    match self.deliverables.iter_mut().find(|local| local.id == id) {
      Some(local) => *local = deliverable.clone(),
      None => self.deliverables.push(deliverable.clone()),
    }
    self.sort();

    Ok(deliverable)
  }

  /// Re-fetches when the event belongs to this project. Returns whether a
  /// refresh happened.
  pub async fn handle_event(&mut self, pool: &SqlitePool, event: &ChangeEvent) -> ApiResult<bool> {
    if event.project_id != self.ctx.project_id() {
      return Ok(false);
    }

    self.refresh(pool).await?;
    Ok(true)
  }

  /// Whether loading this mirror created the project's phases.
  pub fn seeded(&self) -> bool {
    self.seeded
  }

  pub fn context(&self) -> &ProjectContext {
    &self.ctx
  }

  pub fn phases(&self) -> &[Phase] {
    &self.phases
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn deliverables(&self) -> &[Deliverable] {
    &self.deliverables
  }

  pub fn task(&self, id: Uuid) -> Option<&Task> {
    self.tasks.iter().find(|task| task.id == id)
  }

  pub fn phase_tasks(&self, phase_id: Uuid) -> impl Iterator<Item = &Task> {
    self.tasks.iter().filter(move |task| task.phase_id == phase_id)
  }

  pub fn phase_deliverables(&self, phase_id: Uuid) -> impl Iterator<Item = &Deliverable> {
    self
      .deliverables
      .iter()
      .filter(move |deliverable| deliverable.phase_id == phase_id)
  }

  /// Completed and total task counts of a phase.
  pub fn task_progress(&self, phase_id: Uuid) -> (usize, usize) {
    let tasks: Vec<_> = self.phase_tasks(phase_id).collect();
    let completed = tasks.iter().filter(|task| task.status == TaskStatus::Completed).count();
    (completed, tasks.len())
  }

  /// Completed and total deliverable counts of a phase.
  pub fn deliverable_progress(&self, phase_id: Uuid) -> (usize, usize) {
    let deliverables: Vec<_> = self.phase_deliverables(phase_id).collect();
    let completed = deliverables
      .iter()
      .filter(|deliverable| deliverable.status == DeliverableStatus::Completed)
      .count();
    (completed, deliverables.len())
  }

  fn sort(&mut self) {
    self.phases.sort_by_key(|phase| phase.order_index);

    let phase_order: HashMap<Uuid, i64> = self.phases.iter().map(|phase| (phase.id, phase.order_index)).collect();
    let rank = |phase_id: &Uuid| phase_order.get(phase_id).copied().unwrap_or(i64::MAX);

    self
      .tasks
      .sort_by_key(|task| (rank(&task.phase_id), task.order_index, task.created_at));
    self
      .deliverables
      .sort_by_key(|deliverable| (rank(&deliverable.phase_id), deliverable.order_index, deliverable.created_at));
  }
}

fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> Uuid) -> Vec<T> {
  let mut seen = HashSet::with_capacity(items.len());
  items.into_iter().filter(|item| seen.insert(id(item))).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dedup_keeps_first_occurrence() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let items = vec![(a, "first"), (b, "other"), (a, "second")];
    let deduped = dedup_by_id(items, |(id, _)| *id);

    assert_eq!(deduped, vec![(a, "first"), (b, "other")]);
  }
}
