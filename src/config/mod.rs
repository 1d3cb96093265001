//! Configuration module for estate-auth.
//!
//! Handles loading and validating configuration from TOML files.

mod settings;

pub use settings::*;
