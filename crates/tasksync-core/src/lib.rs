//! tasksync-core - Core library for tasksync
//!
//! Keeps a Notion database and a Google Tasks list mirroring each other.
//! This crate holds the canonical record, the reconciler, both vendor
//! adapters, libSQL storage, and the per-tenant sync loops used by the API
//! server and the CLI.

pub mod adapters;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod oauth_state;
pub mod reconcile;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Service, SyncRelationship, TaskRecord, TenantId};
pub use reconcile::{reconcile, SyncPlan};
