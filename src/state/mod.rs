//! Persistent application state
//!
//! - `types`: the stored document and partial updates
//! - `merge`: validate-and-merge onto defaults
//! - `migration`: schema version upgrades
//! - `store`: `AppStore`, the single owner of the stored document

pub mod merge;
pub mod migration;
pub mod store;
pub mod types;

pub use store::{export_file_name, export_file_name_now, AppStore, StoreError};
pub use types::*;
