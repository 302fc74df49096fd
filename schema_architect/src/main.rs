//! schema_architect CLI
//!
//! Compiles a schema description into DDL, migrations and access code.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};

use schema_architect::config::{self, Config, LoggingConfig};
use schema_architect::utils::logging::init_logging;
use schema_architect::{write_artifacts, Artifacts, MigrationOptions, RenameHints, SchemaArchitect};

const DEFAULT_CONFIG: &str = "schema_architect.toml";

/// Schema descriptions to SQLite/D1 DDL, migrations and typed repositories.
#[derive(Parser)]
#[command(name = "schema_architect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Schema description (.toml, .yaml or .json).
    #[arg(short, long, global = true, default_value = "schema.toml")]
    schema: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the schema and write the DDL and entity diagram.
    Schema,

    /// Manage migrations.
    Migration {
        #[command(subcommand)]
        command: MigrationCommands,
    },

    /// Write typed access code for one table, or all tables.
    Repository {
        /// Table to generate; every table when omitted.
        table: Option<String>,
    },

    /// Validate the schema and list every error.
    Check,
}

#[derive(Subcommand)]
enum MigrationCommands {
    /// Compile the next migration from the last snapshot.
    Create {
        /// Migration name, used in the file name.
        name: String,

        /// Permit dropping tables, columns or indexes.
        #[arg(long)]
        allow_destructive: bool,

        /// Treat a table as renamed, as OLD=NEW.
        #[arg(long = "rename-table", value_name = "OLD=NEW")]
        rename_tables: Vec<String>,

        /// Treat a column as renamed, as TABLE.OLD=NEW with TABLE the new table name.
        #[arg(long = "rename-column", value_name = "TABLE.OLD=NEW")]
        rename_columns: Vec<String>,
    },
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(Config::default());
    }
    config::load_from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn rename_hints(tables: &[String], columns: &[String]) -> anyhow::Result<RenameHints> {
    let mut hints = RenameHints::new();
    for entry in tables {
        let (from, to) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid table rename '{}', expected OLD=NEW", entry))?;
        hints = hints.rename_table(from.trim(), to.trim());
    }
    for entry in columns {
        let (column, to) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid column rename '{}', expected TABLE.OLD=NEW", entry))?;
        let (table, from) = column
            .split_once('.')
            .ok_or_else(|| anyhow!("invalid column rename '{}', expected TABLE.OLD=NEW", entry))?;
        hints = hints.rename_column(table.trim(), from.trim(), to.trim());
    }
    Ok(hints)
}

fn write(artifacts: &Artifacts) -> anyhow::Result<()> {
    write_artifacts(artifacts, ".").context("writing generated files")?;
    for path in artifacts.keys() {
        println!("wrote {}", path);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let logging = config.logging.clone().or_else(|| Some(LoggingConfig::default()));
    init_logging(&logging)?;

    let architect = SchemaArchitect::new(config);
    let schema = architect
        .load_schema(&cli.schema)
        .with_context(|| format!("loading schema {}", cli.schema.display()))?;

    match cli.command {
        Commands::Schema => {
            let artifacts = architect.schema_artifacts(&schema)?;
            write(&artifacts)?;
        }

        Commands::Migration {
            command:
                MigrationCommands::Create {
                    name,
                    allow_destructive,
                    rename_tables,
                    rename_columns,
                },
        } => {
            let options = MigrationOptions {
                allow_destructive,
                renames: rename_hints(&rename_tables, &rename_columns)?,
            };
            let (migration, artifacts) = architect.create_migration(&schema, &name, &options)?;
            write(&artifacts)?;
            for warning in &migration.warnings {
                println!("warning: {}", warning);
            }
            if migration.requires_backup() {
                println!("migration {} requires a backup before it is applied", migration.version);
            }
        }

        Commands::Repository { table } => {
            let artifacts = architect.repository_artifacts(&schema, table.as_deref())?;
            write(&artifacts)?;
        }

        Commands::Check => {
            let errors = architect.check(&schema);
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("error: {}", error);
                }
                bail!("schema has {} error(s)", errors.len());
            }
            println!("schema is valid: {} table(s)", schema.len());
        }
    }

    Ok(())
}
