//! Configuration management module
//!
//! This module handles configuration loading and validation from a config
//! file, environment variables and command-line arguments.

pub mod settings;

pub use settings::*;
