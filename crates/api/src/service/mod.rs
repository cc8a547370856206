pub mod access;
pub mod catalog;
pub mod mutation;
pub mod query;
