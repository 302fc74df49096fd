//! Schema module for Schema Architect
//!
//! This module holds the schema model: types, columns, indexes, tables and
//! the graph that ties them together, plus diffing and document loading.

pub mod catalog;
pub mod column;
pub mod diff;
pub mod graph;
pub mod index;
pub mod loader;
pub mod table;

// Re-export key types
pub use catalog::{ScalarType, TargetLanguage};
pub use column::{Column, ForeignKeyRef, OnDeleteAction};
pub use diff::{ColumnChange, RenameHints, SchemaDiff};
pub use graph::{Relationship, RelationshipKind, SchemaGraph};
pub use index::{Index, IndexKind};
pub use loader::SchemaDocument;
pub use table::{Table, TableConstraint};
