//! Schema Architect: compiles schema descriptions into SQLite/D1 artifacts
//!
//! A schema is described as tables, columns, indexes and relationships. Schema
//! Architect validates it and derives the DDL, an entity diagram, versioned
//! reversible migrations and typed repository code. It never talks to a
//! database; every output is text handed back as a map of file paths.

pub mod codegen;
pub mod config;
pub mod error;
pub mod migration;
pub mod schema;
pub mod sql;
pub mod utils;

use std::fs;
use std::path::Path;

// Re-export main types for easier access
pub use codegen::{AccessCodeGenerator, Artifacts};
pub use config::Config;
pub use error::{Error, GenerationError, MigrationError, Result, SchemaError};
pub use migration::{Migration, MigrationCompiler, MigrationHistory};
pub use schema::{RenameHints, SchemaDiff, SchemaDocument, SchemaGraph};

use migration::history::{latest_version_in, tracking_table_ddl};

/// Initialize Schema Architect with the specified configuration file
pub fn init(config_path: &str) -> Result<SchemaArchitect> {
    let config = config::load_from_file(config_path)?;
    Ok(SchemaArchitect::new(config))
}

/// Options for a single `create_migration` call
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Emit destructive actions even when the configuration forbids them
    pub allow_destructive: bool,
    pub renames: RenameHints,
}

/// The main client tying the pipeline stages to the configured file layout
pub struct SchemaArchitect {
    config: Config,
}

impl SchemaArchitect {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load a schema description document
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<SchemaGraph> {
        schema::loader::load_schema(path, &self.config.naming)
    }

    /// Every validation error in `schema`, empty when it is valid
    pub fn check(&self, schema: &SchemaGraph) -> Vec<SchemaError> {
        match schema.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        }
    }

    /// The DDL file and the entity diagram
    pub fn schema_artifacts(&self, schema: &SchemaGraph) -> Result<Artifacts> {
        schema.validate()?;

        let mut artifacts = Artifacts::new();
        artifacts.insert(self.config.output.schema_file.clone(), schema.render_ddl()?);
        artifacts.insert(self.config.output.diagram_file.clone(), schema.render_diagram());

        tracing::info!(tables = schema.len(), "Rendered schema");
        Ok(artifacts)
    }

    /// Compile the next migration for `schema`.
    ///
    /// The previous schema comes from the snapshot in the migrations
    /// directory; without one the migration creates every table. The
    /// returned artifacts hold the migration file, the new snapshot and the
    /// tracking table DDL.
    pub fn create_migration(
        &self,
        schema: &SchemaGraph,
        name: &str,
        options: &MigrationOptions,
    ) -> Result<(Migration, Artifacts)> {
        let settings = &self.config.migrations;
        let directory = Path::new(&settings.directory);
        let snapshot_path = directory.join(&settings.snapshot_file);

        let latest = latest_version_in(directory)?;
        let mut history = MigrationHistory::starting_after(latest);
        let version = history.next_version();

        let compiler = MigrationCompiler::new(settings)
            .allow_destructive(settings.allow_destructive || options.allow_destructive);
        let migration = if snapshot_path.exists() {
            let current = SchemaDocument::load(&snapshot_path)?.into_graph()?;
            compiler.compile_diff(&current, schema, &options.renames, version, name)?
        } else {
            tracing::debug!(path = %snapshot_path.display(), "No snapshot, compiling initial migration");
            compiler.compile_initial(schema, version, name)?
        };
        history.push(migration.clone())?;

        let mut artifacts = Artifacts::new();
        artifacts.insert(
            path_string(&directory.join(migration.filename(settings.version_width))),
            migration.render_file(),
        );
        artifacts.insert(
            path_string(&snapshot_path),
            SchemaDocument::from_graph(schema).to_json()?,
        );
        artifacts.insert(
            path_string(&directory.join(format!("{}.sql", settings.history_table))),
            tracking_table_ddl(&settings.history_table)?,
        );

        Ok((migration, artifacts))
    }

    /// Access code for every table, or for one table when `table` is given
    pub fn repository_artifacts(&self, schema: &SchemaGraph, table: Option<&str>) -> Result<Artifacts> {
        let generator = AccessCodeGenerator::new(&self.config.codegen);
        let generated = match table {
            Some(name) => generator.generate_table(schema, name)?,
            None => generator.generate(schema)?,
        };

        let root = Path::new(&self.config.codegen.output_directory);
        Ok(generated
            .into_iter()
            .map(|(path, content)| (path_string(&root.join(path)), content))
            .collect())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Write artifacts below `base`, creating directories as needed
pub fn write_artifacts(artifacts: &Artifacts, base: impl AsRef<Path>) -> Result<()> {
    let base = base.as_ref();
    for (path, content) in artifacts {
        let target = base.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        tracing::debug!(path = %target.display(), bytes = content.len(), "Wrote artifact");
    }
    Ok(())
}
