//! Canonical phases and the starter tasks and deliverables seeded into each.

use crate::entities::{deliverable::DeliverableType, task::TaskPriority};

pub struct PhaseTemplate {
  pub name: &'static str,
  pub order_index: i64,
  pub tasks: &'static [TaskTemplate],
  pub deliverables: &'static [DeliverableTemplate],
}

pub struct TaskTemplate {
  pub title: &'static str,
  pub description: &'static str,
  pub priority: TaskPriority,
}

pub struct DeliverableTemplate {
  pub name: &'static str,
  pub description: &'static str,
  pub r#type: DeliverableType,
}

const fn task(title: &'static str, description: &'static str, priority: TaskPriority) -> TaskTemplate {
  TaskTemplate {
    title,
    description,
    priority,
  }
}

const fn deliverable(name: &'static str, description: &'static str, r#type: DeliverableType) -> DeliverableTemplate {
  DeliverableTemplate {
    name,
    description,
    r#type,
  }
}

pub const PHASES: [PhaseTemplate; 4] = [
  PhaseTemplate {
    name: "Requirements Definition",
    order_index: 1,
    tasks: &[
      task(
        "Interview stakeholders",
        "Collect business goals and pain points from every stakeholder group.",
        TaskPriority::High,
      ),
      task(
        "Define functional requirements",
        "List the features the system must provide, with acceptance criteria.",
        TaskPriority::High,
      ),
      task(
        "Define non-functional requirements",
        "Performance, availability, security and operational constraints.",
        TaskPriority::Medium,
      ),
      task(
        "Agree on project scope",
        "Confirm what is in and out of scope with the project sponsor.",
        TaskPriority::Medium,
      ),
    ],
    deliverables: &[
      deliverable(
        "Requirements specification",
        "Functional and non-functional requirements with priorities.",
        DeliverableType::Document,
      ),
      deliverable(
        "Use case list",
        "Actors and the use cases they perform.",
        DeliverableType::Document,
      ),
    ],
  },
  PhaseTemplate {
    name: "Basic Design",
    order_index: 2,
    tasks: &[
      task(
        "Design system architecture",
        "Choose components, their responsibilities and how they communicate.",
        TaskPriority::High,
      ),
      task(
        "Design data model",
        "Entities, relationships and ownership of data.",
        TaskPriority::High,
      ),
      task(
        "Select technology stack",
        "Languages, frameworks and hosted services with rationale.",
        TaskPriority::Medium,
      ),
    ],
    deliverables: &[
      deliverable(
        "Architecture diagram",
        "Component and deployment view of the system.",
        DeliverableType::Design,
      ),
      deliverable(
        "Basic design document",
        "Architecture decisions, data model and interfaces between subsystems.",
        DeliverableType::Document,
      ),
      deliverable(
        "ER diagram",
        "Entity relationship diagram of the data model.",
        DeliverableType::Design,
      ),
    ],
  },
  PhaseTemplate {
    name: "External Design",
    order_index: 3,
    tasks: &[
      task(
        "Design screens",
        "Screen list, layout and transitions for every use case.",
        TaskPriority::High,
      ),
      task(
        "Design external interfaces",
        "API endpoints, file formats and integrations with other systems.",
        TaskPriority::High,
      ),
      task(
        "Define error messages",
        "User-facing messages for validation and system errors.",
        TaskPriority::Low,
      ),
    ],
    deliverables: &[
      deliverable(
        "Screen design document",
        "Wireframes and transition diagram.",
        DeliverableType::Design,
      ),
      deliverable(
        "API specification",
        "Request and response formats for every external interface.",
        DeliverableType::Document,
      ),
    ],
  },
  PhaseTemplate {
    name: "Development Preparation",
    order_index: 4,
    tasks: &[
      task(
        "Set up development environment",
        "Repository, local tooling and shared configuration.",
        TaskPriority::High,
      ),
      task(
        "Define coding standards",
        "Style guide, review process and branching strategy.",
        TaskPriority::Medium,
      ),
      task(
        "Set up CI pipeline",
        "Automated build, lint and test on every change.",
        TaskPriority::Medium,
      ),
      task(
        "Plan test strategy",
        "Test levels, environments and entry and exit criteria.",
        TaskPriority::Medium,
      ),
    ],
    deliverables: &[
      deliverable(
        "Development guidelines",
        "Coding standards and workflow agreed by the team.",
        DeliverableType::Document,
      ),
      deliverable(
        "Project skeleton",
        "Initial repository with build and CI configuration.",
        DeliverableType::Code,
      ),
      deliverable(
        "Test plan",
        "Scope and schedule of testing activities.",
        DeliverableType::Document,
      ),
    ],
  },
];

/// Looks up the catalogue entry for a phase by its name.
pub fn phase_template(name: &str) -> Option<&'static PhaseTemplate> {
  PHASES.iter().find(|phase| phase.name == name)
}
