//! Azure Blob Storage access for the backup destination
//!
//! This module builds the storage context from an account key and exposes
//! the container and blob operations the backup workflow needs.

pub mod manager;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use manager::{AzureBlobStorage, StorageOperations};
pub use models::*;
pub use storage::StorageContext;
