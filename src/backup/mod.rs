//! Backup workflow
//!
//! Blob naming, the retention rule and the sequential run that ties the
//! authentication, storage and API Management pieces together.

pub mod naming;
pub mod retention;
pub mod workflow;

pub use naming::{backup_blob_name, DEFAULT_BACKUP_PREFIX};
pub use retention::{is_expired, retention_cutoff, select_expired, DEFAULT_RETENTION_DAYS};
pub use workflow::{BackupWorkflow, Clock, ContainerState, RunSummary};
