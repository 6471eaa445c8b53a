pub mod common;
pub mod mappings;
pub mod relationships;
pub mod sync_once;
