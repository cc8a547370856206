pub mod deliverables;
pub mod documents;
pub mod invitations;
pub mod members;
pub mod phases;
pub mod projects;
pub mod tasks;
pub mod users;
