//! Utilities for Schema Architect
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{apply_naming_convention, get_index_name, record_name, slugify, NamingStyle};
