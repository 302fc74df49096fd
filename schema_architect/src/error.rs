//! Error types for Schema Architect

use thiserror::Error;

/// Result type for Schema Architect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems in a schema description.
///
/// `SchemaGraph::validate` collects every one of these it can find in a single
/// pass; the builders return them one at a time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table '{table}' is declared more than once")]
    DuplicateTable { table: String },

    #[error("Column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Table '{table}' has several primary key columns ({}) without a composite PRIMARY KEY constraint", .columns.join(", "))]
    AmbiguousPrimaryKey { table: String, columns: Vec<String> },

    #[error("Column '{table}.{column}' references missing column '{target_table}.{target_column}'")]
    DanglingForeignKey {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },

    #[error("Column '{table}.{column}' references '{target_table}.{target_column}', which is neither unique nor a primary key")]
    ForeignKeyTargetNotUnique {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },

    #[error("Foreign keys form a cycle between tables: {}", .tables.join(", "))]
    CyclicForeignKey { tables: Vec<String> },

    #[error("Derived name '{name}' collides in {scope}")]
    NameCollision { scope: String, name: String },

    #[error("Index '{index}' names column '{column}', which does not exist on its table")]
    InvalidIndexColumn { index: String, column: String },

    #[error("Index '{index}' is declared more than once in the schema")]
    DuplicateIndex { index: String },

    #[error("Index '{index}' belongs to table '{index_table}' but was attached to table '{table}'")]
    MisplacedIndex {
        index: String,
        index_table: String,
        table: String,
    },

    #[error("Index '{index}' is invalid: {reason}")]
    InvalidIndex { index: String, reason: String },

    #[error("Column '{table}.{column}' is invalid: {reason}")]
    InvalidColumn {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Relationship refers to unknown table '{table}'")]
    UnknownTable { table: String },

    #[error("Many-to-many relationship between '{from}' and '{to}' has no junction table with a composite key over both foreign keys")]
    MissingJunctionTable { from: String, to: String },

    #[error("Relationship {kind} from '{from}' to '{to}' has no matching foreign key")]
    InconsistentRelationship {
        from: String,
        to: String,
        kind: String,
    },
}

/// Failures while turning a schema into migrations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Migration {version} contains destructive action '{action}'; pass allow_destructive to emit it")]
    DestructiveActionBlocked { version: u32, action: String },

    #[error("Migration version {attempted} does not follow version {previous}")]
    NonMonotonicVersion { previous: u32, attempted: u32 },

    #[error("Unknown migration version {0}")]
    UnknownVersion(u32),

    #[error("Migration {version} cannot move from {from} to {to}")]
    InvalidTransition {
        version: u32,
        from: String,
        to: String,
    },

    #[error("Migration '{0}' has no changes")]
    EmptyMigration(String),
}

/// Failures while deriving SQL text or access code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("No scalar type matches '{0}'")]
    UnmappedScalarType(String),

    #[error("Identifier {identifier:?} cannot be escaped: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Table '{table}' has no primary key to derive accessors from")]
    MissingPrimaryKey { table: String },
}

/// Error types for Schema Architect
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Schema validation failed with {} error(s):\n{}", .0.len(), .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<SchemaError>),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Every schema error carried by this error, flattened
    pub fn schema_errors(&self) -> Vec<&SchemaError> {
        match self {
            Error::Schema(e) => vec![e],
            Error::Validation(errors) => errors.iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Vec<SchemaError>> for Error {
    fn from(errors: Vec<SchemaError>) -> Self {
        Error::Validation(errors)
    }
}

/// Convert Serde JSON errors to Schema Architect errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

/// Convert TOML deserialization errors to Schema Architect errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
