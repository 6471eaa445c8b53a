//! Database layer for tasksync

mod connection;
mod identity_repository;
mod migrations;
mod relationship_repository;

pub use connection::Database;
pub use identity_repository::{IdentityRepository, LibSqlIdentityRepository};
pub use relationship_repository::{
    LibSqlRelationshipRepository, ListSelection, RelationshipRepository,
};
