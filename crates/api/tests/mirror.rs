//! Local project mirror kept in step with the database.

mod common;

use designdesk_api::{
  entities::task::TaskStatus,
  error::ApiError,
  mirror::ProjectMirror,
  notifier::{Action, ChangeEvent, Entity},
  service::{
    mutation::{self, tasks::UpdateTaskParams},
    query,
  },
};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Loading a project without phases seeds them first.
#[sqlx::test]
async fn test_load_seeds_and_orders(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let mirror = ProjectMirror::load(&pool, ctx.clone()).await.unwrap();

  assert!(mirror.seeded());
  assert_eq!(mirror.phases().len(), 4);
  assert!(mirror.phases().windows(2).all(|w| w[0].order_index < w[1].order_index));

  let phase_of = |phase_id: Uuid| {
    mirror
      .phases()
      .iter()
      .find(|phase| phase.id == phase_id)
      .map(|phase| phase.order_index)
      .unwrap()
  };
  let keys: Vec<_> = mirror
    .tasks()
    .iter()
    .map(|task| (phase_of(task.phase_id), task.order_index))
    .collect();
  let mut sorted = keys.clone();
  sorted.sort();
  assert_eq!(keys, sorted);

  let reloaded = ProjectMirror::load(&pool, ctx).await.unwrap();
  assert!(!reloaded.seeded());
  assert_eq!(reloaded.phases(), mirror.phases());
}

/// Completing a task updates the mirror without moving it.
#[sqlx::test]
async fn test_update_task_reflects_locally(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let mut mirror = ProjectMirror::load(&pool, ctx).await.unwrap();
  let before = mirror.tasks()[0].clone();
  let phase_id = before.phase_id;
  assert_eq!(mirror.task_progress(phase_id).0, 0);

  let updated = mirror
    .update_task(
      &pool,
      before.id,
      UpdateTaskParams {
        status: Some(TaskStatus::Completed),
        ..Default::default()
      },
    )
    .await
    .unwrap();

  assert_eq!(updated.status, TaskStatus::Completed);
  assert_eq!(updated.order_index, before.order_index);
  assert_eq!(updated.version, before.version + 1);

  let local = mirror.task(before.id).unwrap();
  assert_eq!(local, &updated);
  assert_eq!(mirror.tasks()[0].id, before.id);
  assert_eq!(mirror.task_progress(phase_id).0, 1);

  let stored = query::tasks::find(&pool, project.id, before.id).await.unwrap().unwrap();
  assert_eq!(&stored, local);
}

/// A stale version is rejected and the mirror keeps its copy.
#[sqlx::test]
async fn test_stale_version_conflicts(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let mut mirror = ProjectMirror::load(&pool, ctx.clone()).await.unwrap();
  let task = mirror.tasks()[0].clone();

  // Someone else edits the task first.
  mutation::tasks::update(
    &pool,
    &ctx,
    task.id,
    UpdateTaskParams {
      title: Some("Renamed elsewhere".into()),
      ..Default::default()
    },
  )
  .await
  .unwrap();

  let result = mirror
    .update_task(
      &pool,
      task.id,
      UpdateTaskParams {
        status: Some(TaskStatus::InProgress),
        expected_version: Some(task.version),
        ..Default::default()
      },
    )
    .await;

  assert!(matches!(
    result,
    Err(ApiError::VersionConflict { expected, actual, .. }) if expected == task.version && actual == task.version + 1
  ));
  assert_eq!(mirror.task(task.id).unwrap(), &task);

  let stored = query::tasks::find(&pool, project.id, task.id).await.unwrap().unwrap();
  assert_eq!(stored.status, TaskStatus::Todo);
  assert_eq!(stored.title, "Renamed elsewhere");
}

/// Events for other projects are ignored, own events trigger a re-fetch.
#[sqlx::test]
async fn test_handle_event_refreshes_own_project(pool: SqlitePool) {
  let owner = common::create_user(&pool, "owner@x.com", "Owner").await;
  let project = common::create_project(&pool, &owner, "Shop").await;
  let ctx = common::context(&pool, project.id, &owner).await;

  let mut mirror = ProjectMirror::load(&pool, ctx.clone()).await.unwrap();
  let task = mirror.tasks()[0].clone();

  mutation::tasks::delete(&pool, &ctx, task.id).await.unwrap();

  let foreign = ChangeEvent {
    project_id: Uuid::new_v4(),
    entity: Entity::Task,
    action: Action::Deleted,
  };
  assert!(!mirror.handle_event(&pool, &foreign).await.unwrap());
  assert!(mirror.task(task.id).is_some());

  let own = ChangeEvent {
    project_id: project.id,
    ..foreign
  };
  assert!(mirror.handle_event(&pool, &own).await.unwrap());
  assert!(mirror.task(task.id).is_none());
}
