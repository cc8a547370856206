use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use utoipa::ToSchema;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
  Project,
  Phase,
  Task,
  Deliverable,
  Member,
  Invitation,
  Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Created,
  Updated,
  Deleted,
}

/// Pushed to subscribers after every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChangeEvent {
  pub project_id: Uuid,
  pub entity: Entity,
  pub action: Action,
}

/// Fan-out of change events to every open subscription.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
  tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeNotifier {
  fn default() -> Self {
    Self::new()
  }
}

impl ChangeNotifier {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { tx }
  }

  pub fn publish(&self, project_id: Uuid, entity: Entity, action: Action) {
    let event = ChangeEvent {
      project_id,
      entity,
      action,
    };

    // No subscribers is not an error.
    if self.tx.send(event).is_err() {
      trace!(?event, "No change subscribers");
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
    self.tx.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_subscribers_receive_published_events() {
    let notifier = ChangeNotifier::new();
    let mut rx = notifier.subscribe();
    let project_id = Uuid::new_v4();

    notifier.publish(project_id, Entity::Task, Action::Updated);

    let event = rx.recv().await.unwrap();
    assert_eq!(
      event,
      ChangeEvent {
        project_id,
        entity: Entity::Task,
        action: Action::Updated
      }
    );
  }

  #[test]
  fn test_publish_without_subscribers() {
    ChangeNotifier::new().publish(Uuid::new_v4(), Entity::Project, Action::Deleted);
  }
}
