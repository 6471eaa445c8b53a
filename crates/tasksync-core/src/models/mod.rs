//! Data models for tasksync

mod mapping;
mod record;
mod relationship;

pub use mapping::IdentityMapping;
pub use record::{
    format_precise_timestamp, format_timestamp, normalize_id, parse_timestamp, Service,
    TaskRecord,
};
pub use relationship::{
    GoogleCredentials, GoogleTasksConnection, NotionConnection, NotionCredentials,
    SyncRelationship, TenantId,
};
