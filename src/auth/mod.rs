//! Authentication module for Azure services
//!
//! This module provides the credential provider abstraction used to reach
//! Azure Resource Manager, with implementations for DefaultAzureCredential,
//! client secrets and pre-issued tokens.

pub mod provider;

pub use provider::*;
