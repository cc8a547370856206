pub mod deliverables;
pub mod documents;
pub mod invitations;
pub mod members;
pub mod phases;
pub mod projects;
pub mod tasks;
pub mod users;

pub(crate) fn calculate_total_pages(total_count: i64, limit: i64) -> i64 {
  if limit <= 0 {
    return 0;
  }

  (total_count as f64 / limit as f64).ceil() as i64
}
