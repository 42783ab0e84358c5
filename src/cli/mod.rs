//! Command-line interface module
//!
//! This module handles command-line argument parsing and command dispatch.

pub mod commands;

pub use commands::*;
