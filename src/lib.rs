//! apim-backup - Azure API Management backup tool
//!
//! Backs up an API Management instance to Azure Blob Storage and deletes
//! backups that are older than the retention window.

pub mod apim;
pub mod auth;
pub mod backup;
pub mod blob;
pub mod cli;
pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used types
pub use error::{ApimBackupError, Result};
