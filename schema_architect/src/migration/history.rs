//! Migration values, their lifecycle and on-disk form
//!
//! A migration is drafted from its actions, generated once by the compiler,
//! and afterwards only moves through the runner states recorded with
//! [`MigrationHistory::mark_applied`] and [`MigrationHistory::mark_rolled_back`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{MigrationError, Result};
use crate::migration::action::MigrationAction;
use crate::migration::compiler::MigrationWarning;
use crate::sql::ast::{ColumnConstraint, ColumnDef, CreateTable, Statement};
use crate::sql::printer;
use crate::utils::naming::slugify;

static MIGRATION_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_[^/\\]*\.sql$").expect("static regex"));

pub const UP_MARKER: &str = "-- +migrate Up";
pub const DOWN_MARKER: &str = "-- +migrate Down";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationState {
    Draft,
    Generated,
    Applied,
    RolledBack,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationState::Draft => "draft",
            MigrationState::Generated => "generated",
            MigrationState::Applied => "applied",
            MigrationState::RolledBack => "rolled back",
        })
    }
}

/// A versioned pair of forward and backward schema changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub actions: Vec<MigrationAction>,
    pub up_sql: String,
    pub down_sql: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
    pub warnings: Vec<MigrationWarning>,
}

impl Migration {
    pub fn draft(version: u32, name: &str, actions: Vec<MigrationAction>) -> Self {
        Self {
            version,
            name: name.to_string(),
            actions,
            up_sql: String::new(),
            down_sql: String::new(),
            state: MigrationState::Draft,
            applied_at: None,
            warnings: Vec::new(),
        }
    }

    /// Attach the compiled SQL; only a draft can be generated
    pub fn generate(
        mut self,
        up_sql: String,
        down_sql: String,
        warnings: Vec<MigrationWarning>,
    ) -> std::result::Result<Self, MigrationError> {
        self.transition(MigrationState::Draft, MigrationState::Generated)?;
        self.up_sql = up_sql;
        self.down_sql = down_sql;
        self.warnings = warnings;
        Ok(self)
    }

    pub fn mark_applied(&mut self, at: DateTime<Utc>) -> std::result::Result<(), MigrationError> {
        self.transition(MigrationState::Generated, MigrationState::Applied)?;
        self.applied_at = Some(at);
        Ok(())
    }

    pub fn mark_rolled_back(&mut self) -> std::result::Result<(), MigrationError> {
        self.transition(MigrationState::Applied, MigrationState::RolledBack)
    }

    fn transition(
        &mut self,
        expected: MigrationState,
        next: MigrationState,
    ) -> std::result::Result<(), MigrationError> {
        if self.state != expected {
            return Err(MigrationError::InvalidTransition {
                version: self.version,
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn is_destructive(&self) -> bool {
        self.actions.iter().any(MigrationAction::is_destructive)
    }

    pub fn requires_backup(&self) -> bool {
        self.actions.iter().any(MigrationAction::requires_backup)
    }

    /// `{version}_{slug}.sql` with the version zero-padded to `width`
    pub fn filename(&self, width: usize) -> String {
        format!("{:0width$}_{}.sql", self.version, slugify(&self.name), width = width)
    }

    /// The migration file: a header, then the up and down sections
    pub fn render_file(&self) -> String {
        let mut file = format!("-- Migration {}: {}\n", self.version, self.name);
        if self.requires_backup() {
            file.push_str("-- Take a backup before applying: this migration rewrites or removes data\n");
        }
        for warning in &self.warnings {
            file.push_str(&format!("-- WARNING: {}\n", warning));
        }

        file.push('\n');
        file.push_str(UP_MARKER);
        file.push('\n');
        file.push_str(&self.up_sql);
        file.push_str("\n\n");
        file.push_str(DOWN_MARKER);
        file.push('\n');
        file.push_str(&self.down_sql);
        file.push('\n');
        file
    }
}

/// Generated migrations in version order
#[derive(Debug, Clone, Default)]
pub struct MigrationHistory {
    migrations: Vec<Migration>,
    floor: u32,
}

impl MigrationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history continuing after migrations that live elsewhere, such as on disk
    pub fn starting_after(version: u32) -> Self {
        Self {
            migrations: Vec::new(),
            floor: version,
        }
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(self.floor, |m| m.version)
    }

    pub fn next_version(&self) -> u32 {
        self.latest_version() + 1
    }

    /// Append a migration; versions must strictly increase
    pub fn push(&mut self, migration: Migration) -> std::result::Result<(), MigrationError> {
        let previous = self.latest_version();
        if migration.version <= previous {
            return Err(MigrationError::NonMonotonicVersion {
                previous,
                attempted: migration.version,
            });
        }
        self.migrations.push(migration);
        Ok(())
    }

    pub fn get(&self, version: u32) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.version == version)
    }

    fn get_mut(&mut self, version: u32) -> std::result::Result<&mut Migration, MigrationError> {
        self.migrations
            .iter_mut()
            .find(|m| m.version == version)
            .ok_or(MigrationError::UnknownVersion(version))
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Generated migrations not yet applied, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Migration> {
        self.migrations
            .iter()
            .filter(|m| m.state == MigrationState::Generated)
    }

    /// Record that the runner applied `version` at `at`
    pub fn mark_applied(
        &mut self,
        version: u32,
        at: DateTime<Utc>,
    ) -> std::result::Result<(), MigrationError> {
        self.get_mut(version)?.mark_applied(at)?;
        tracing::info!(version, applied_at = %at, "Migration marked applied");
        Ok(())
    }

    pub fn mark_rolled_back(&mut self, version: u32) -> std::result::Result<(), MigrationError> {
        self.get_mut(version)?.mark_rolled_back()?;
        tracing::info!(version, "Migration marked rolled back");
        Ok(())
    }
}

/// DDL for the table a migration runner records applied versions in
pub fn tracking_table_ddl(table_name: &str) -> Result<String> {
    let column = |name: &str, type_name: &'static str, constraints| ColumnDef {
        name: name.to_string(),
        type_name,
        constraints,
    };
    let statement = Statement::CreateTable(CreateTable {
        name: table_name.to_string(),
        if_not_exists: true,
        columns: vec![
            column("version", "TEXT", vec![ColumnConstraint::Unique]),
            column("name", "TEXT", Vec::new()),
            column("applied_at", "TIMESTAMP", Vec::new()),
        ],
        constraints: Vec::new(),
        comment: None,
    });

    let mut ddl = printer::render(&statement)?;
    ddl.push('\n');
    Ok(ddl)
}

/// Version prefix of a migration file name such as `0003_add_posts.sql`
pub fn parse_version_from_filename(filename: &str) -> Option<u32> {
    MIGRATION_FILENAME
        .captures(filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Highest migration version found in `directory`; 0 when there is none
pub fn latest_version_in(directory: &Path) -> Result<u32> {
    if !directory.exists() {
        return Ok(0);
    }

    let mut latest = 0;
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if let Some(version) = entry.file_name().to_str().and_then(parse_version_from_filename) {
            latest = latest.max(version);
        }
    }
    Ok(latest)
}
