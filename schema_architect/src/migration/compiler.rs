//! Migration compiler
//!
//! Turns a schema graph, or the diff between two graphs, into a versioned
//! migration with matching up and down SQL.

use std::fmt;

use crate::config::MigrationsConfig;
use crate::error::{MigrationError, Result};
use crate::migration::action::MigrationAction;
use crate::migration::history::Migration;
use crate::schema::diff::{RenameHints, SchemaDiff};
use crate::schema::graph::SchemaGraph;
use crate::schema::table::Table;
use crate::sql::ast::Statement;
use crate::sql::printer;

/// Advisory findings; they never stop a migration from being generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationWarning {
    MissingForeignKeyIndex { table: String, column: String },
    TableRebuild { table: String },
    NotNullWithoutDefault { table: String, column: String },
}

impl fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationWarning::MissingForeignKeyIndex { table, column } => write!(
                f,
                "foreign key {}.{} has no index leading with it; joins and cascades will scan the table",
                table, column
            ),
            MigrationWarning::TableRebuild { table } => write!(
                f,
                "table {} is rebuilt by copying its rows; expect a full table write",
                table
            ),
            MigrationWarning::NotNullWithoutDefault { table, column } => write!(
                f,
                "column {}.{} is NOT NULL without a default; copying existing rows will fail",
                table, column
            ),
        }
    }
}

/// Compiles schema graphs into migrations
pub struct MigrationCompiler {
    allow_destructive: bool,
}

impl MigrationCompiler {
    /// Create a new compiler; destructive actions follow the configured default
    pub fn new(config: &MigrationsConfig) -> Self {
        Self {
            allow_destructive: config.allow_destructive,
        }
    }

    pub fn allow_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }

    /// One `CreateTable` per table, referenced tables first
    pub fn compile_initial(&self, schema: &SchemaGraph, version: u32, name: &str) -> Result<Migration> {
        schema.validate()?;

        let actions = schema
            .topological_order()?
            .into_iter()
            .cloned()
            .map(MigrationAction::CreateTable)
            .collect();

        self.compile_actions(version, name, actions, schema)
    }

    /// The actions taking a database at `current` to `target`
    pub fn compile_diff(
        &self,
        current: &SchemaGraph,
        target: &SchemaGraph,
        hints: &RenameHints,
        version: u32,
        name: &str,
    ) -> Result<Migration> {
        target.validate()?;

        let diff = SchemaDiff::generate(current, target, hints);
        if diff.is_empty() {
            return Err(MigrationError::EmptyMigration(name.to_string()).into());
        }

        let target_order = target.topological_order()?;
        let current_order = current.topological_order()?;
        let mut actions = Vec::new();

        actions.extend(diff.indexes_to_drop.iter().cloned().map(MigrationAction::DropIndex));

        for (from, to) in &diff.tables_to_rename {
            actions.push(MigrationAction::RenameTable {
                from: from.clone(),
                to: to.clone(),
            });
        }
        for change in &diff.table_changes {
            for (from, to) in &change.columns_to_rename {
                actions.push(MigrationAction::RenameColumn {
                    table: change.table.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        let mut created = diff.tables_to_create.clone();
        created.sort_by_key(|t| position(&target_order, &t.name));
        actions.extend(created.into_iter().map(MigrationAction::CreateTable));

        for change in &diff.table_changes {
            for column in &change.columns_to_add {
                actions.push(MigrationAction::AddColumn {
                    table: change.table.clone(),
                    column: column.clone(),
                });
            }
        }

        let mut rebuilt: Vec<_> = diff
            .table_changes
            .iter()
            .filter_map(|c| c.rebuild.as_ref())
            .collect();
        rebuilt.sort_by_key(|r| position(&target_order, &r.to.name));
        for rebuild in rebuilt {
            actions.push(MigrationAction::AlterTable {
                from: rebuild.from.clone(),
                to: rebuild.to.clone(),
                dependents: cascading_dependents(current, target, &diff, &rebuild.to.name),
            });
        }

        for change in &diff.table_changes {
            for column in &change.columns_to_drop {
                actions.push(MigrationAction::DropColumn {
                    table: change.table.clone(),
                    column: column.clone(),
                });
            }
        }

        let mut dropped = diff.tables_to_drop.clone();
        dropped.sort_by_key(|t| std::cmp::Reverse(position(&current_order, &t.name)));
        actions.extend(dropped.into_iter().map(MigrationAction::DropTable));

        actions.extend(diff.indexes_to_create.iter().cloned().map(MigrationAction::CreateIndex));

        self.compile_actions(version, name, actions, target)
    }

    /// Render `actions` into a generated migration.
    ///
    /// The down section undoes the actions in reverse order. `target` is the
    /// schema the migration produces and is only read for warnings.
    pub fn compile_actions(
        &self,
        version: u32,
        name: &str,
        actions: Vec<MigrationAction>,
        target: &SchemaGraph,
    ) -> Result<Migration> {
        if actions.is_empty() {
            return Err(MigrationError::EmptyMigration(name.to_string()).into());
        }
        if !self.allow_destructive {
            if let Some(action) = actions.iter().find(|a| a.is_destructive()) {
                return Err(MigrationError::DestructiveActionBlocked {
                    version,
                    action: action.to_string(),
                }
                .into());
            }
        }

        let up: Vec<Statement> = actions.iter().flat_map(MigrationAction::up_statements).collect();
        let down: Vec<Statement> = actions
            .iter()
            .rev()
            .flat_map(MigrationAction::down_statements)
            .collect();
        let up_sql = printer::render_all(&up)?;
        let down_sql = printer::render_all(&down)?;

        let warnings = collect_warnings(&actions, target);
        for warning in &warnings {
            tracing::warn!(version, "{}", warning);
        }

        tracing::info!(version, actions = actions.len(), "Compiled migration");

        Ok(Migration::draft(version, name, actions).generate(up_sql, down_sql, warnings)?)
    }
}

/// Position of `name` in a table order; unknown tables sort last
fn position(order: &[&Table], name: &str) -> usize {
    order
        .iter()
        .position(|t| t.name.eq_ignore_ascii_case(name))
        .unwrap_or(usize::MAX)
}

/// Tables whose rows an `ON DELETE` action rewrites when `table`, named as
/// in `target`, is dropped during its rebuild. Both the current and the
/// target definitions of each referencing table count.
fn cascading_dependents(
    current: &SchemaGraph,
    target: &SchemaGraph,
    diff: &SchemaDiff,
    table: &str,
) -> Vec<String> {
    let new_name = |name: &str| {
        diff.tables_to_rename
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(name))
            .map_or_else(|| name.to_string(), |(_, to)| to.clone())
    };
    let old_name = diff
        .tables_to_rename
        .iter()
        .find(|(_, to)| to.eq_ignore_ascii_case(table))
        .map_or(table, |(from, _)| from.as_str());

    let cascades_to = |child: &Table, parent: &str| {
        !child.name.eq_ignore_ascii_case(parent)
            && child.foreign_keys().any(|(column, reference)| {
                reference.table.eq_ignore_ascii_case(parent) && column.on_delete.modifies_children()
            })
    };

    let mut dependents: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !dependents.iter().any(|d| d.eq_ignore_ascii_case(&name)) {
            dependents.push(name);
        }
    };
    for child in current.tables().filter(|t| cascades_to(t, old_name)) {
        push(new_name(&child.name));
    }
    let created = |name: &str| diff.tables_to_create.iter().any(|t| t.name.eq_ignore_ascii_case(name));
    for child in target
        .tables()
        .filter(|t| !created(&t.name) && cascades_to(t, table))
    {
        push(child.name.clone());
    }
    dependents
}

fn collect_warnings(actions: &[MigrationAction], target: &SchemaGraph) -> Vec<MigrationWarning> {
    let mut warnings = Vec::new();

    for action in actions {
        let fk_columns: Vec<&str> = match action {
            MigrationAction::CreateTable(table) | MigrationAction::AlterTable { to: table, .. } => {
                table.foreign_keys().map(|(c, _)| c.name.as_str()).collect()
            }
            MigrationAction::AddColumn { column, .. } if column.references.is_some() => {
                vec![column.name.as_str()]
            }
            _ => Vec::new(),
        };
        let table = target.table(action.table());
        for column in fk_columns {
            if !table.map_or(false, |t| is_indexed(t, column)) {
                warnings.push(MigrationWarning::MissingForeignKeyIndex {
                    table: action.table().to_string(),
                    column: column.to_string(),
                });
            }
        }

        if let MigrationAction::AlterTable { from, to, .. } = action {
            warnings.push(MigrationWarning::TableRebuild {
                table: to.name.clone(),
            });
            for column in &to.columns {
                let is_new = from.column(&column.name).is_none();
                if is_new && !column.nullable && column.default.is_none() {
                    warnings.push(MigrationWarning::NotNullWithoutDefault {
                        table: to.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }
    }

    warnings
}

/// Whether lookups by `column` can use an index
fn is_indexed(table: &Table, column: &str) -> bool {
    let pk = table.primary_key();
    if pk.first().map_or(false, |c| c.eq_ignore_ascii_case(column)) {
        return true;
    }
    table.column(column).map_or(false, |c| c.unique) || table.indexes.iter().any(|i| i.leads_with(column))
}
