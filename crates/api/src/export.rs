use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::mirror::ProjectMirror;

/// Renders the mirrored project as a markdown report: phases in order,
/// each with its progress and task and deliverable tables.
pub fn render_markdown(mirror: &ProjectMirror, generated_at: DateTime<Utc>) -> String {
  let project = &mirror.context().project;
  let mut out = String::new();

  let _ = writeln!(out, "# {}", project.name);
  let _ = writeln!(out);
  if !project.description.is_empty() {
    let _ = writeln!(out, "{}", project.description);
    let _ = writeln!(out);
  }
  let _ = writeln!(out, "_Generated {}_", generated_at.format("%Y-%m-%d %H:%M UTC"));

  for phase in mirror.phases() {
    let (done, total) = mirror.task_progress(phase.id);
    let (delivered, expected) = mirror.deliverable_progress(phase.id);

    let _ = writeln!(out);
    let _ = writeln!(out, "## {}. {}", phase.order_index, phase.name);
    let _ = writeln!(out);
    let _ = writeln!(
      out,
      "Progress: {}% ({done}/{total} tasks, {delivered}/{expected} deliverables)",
      percent(done, total)
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "### Tasks");
    let _ = writeln!(out);
    if total == 0 {
      let _ = writeln!(out, "No tasks.");
    } else {
      let _ = writeln!(out, "| # | Title | Status | Priority |");
      let _ = writeln!(out, "|---|---|---|---|");
      for task in mirror.phase_tasks(phase.id) {
        let _ = writeln!(
          out,
          "| {} | {} | {} | {} |",
          task.order_index,
          cell(&task.title),
          task.status,
          task.priority
        );
      }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "### Deliverables");
    let _ = writeln!(out);
    if expected == 0 {
      let _ = writeln!(out, "No deliverables.");
    } else {
      let _ = writeln!(out, "| # | Name | Type | Status |");
      let _ = writeln!(out, "|---|---|---|---|");
      for deliverable in mirror.phase_deliverables(phase.id) {
        let _ = writeln!(
          out,
          "| {} | {} | {} | {} |",
          deliverable.order_index,
          cell(&deliverable.name),
          deliverable.r#type,
          deliverable.status
        );
      }
    }
  }

  out
}

/// File name offered for the report download.
pub fn file_name(project_name: &str) -> String {
  let slug: String = project_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
    .collect();
  let slug = slug.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");

  if slug.is_empty() {
    "project.md".to_string()
  } else {
    format!("{slug}.md")
  }
}

fn percent(done: usize, total: usize) -> usize {
  if total == 0 {
    0
  } else {
    done * 100 / total
  }
}

fn cell(text: &str) -> String {
  text.replace('|', "\\|").replace('\n', " ")
}
