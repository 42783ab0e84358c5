//! Utility functions module
//!
//! HTTP client construction, network error classification and date/time
//! conversion helpers.

pub mod datetime;
pub mod network;

pub use datetime::*;
pub use network::*;
