//! Migration compilation and history
//!
//! This module turns schema graphs into versioned, reversible migrations.

pub mod action;
pub mod compiler;
pub mod history;

pub use action::{MigrationAction, RollbackStrategy};
pub use compiler::{MigrationCompiler, MigrationWarning};
pub use history::{Migration, MigrationHistory, MigrationState};
