//! Azure API Management service backup
//!
//! This module drives the management-plane backup action of an API
//! Management instance through Azure Resource Manager.

pub mod models;
pub mod operations;

pub use models::*;
pub use operations::{ApimOperations, AzureApimOperations, DEFAULT_MANAGEMENT_ENDPOINT};
