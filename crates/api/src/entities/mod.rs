pub mod deliverable;
pub mod document;
pub mod invitation;
pub mod member;
pub mod phase;
pub mod project;
pub mod task;
pub mod user;
