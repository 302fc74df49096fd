//! Migration actions and how each one is undone

use std::fmt;

use crate::schema::column::Column;
use crate::schema::index::Index;
use crate::schema::table::Table;
use crate::sql::ast::Statement;

/// One schema change inside a migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationAction {
    /// Creates the table and its indexes
    CreateTable(Table),
    DropTable(Table),
    RenameTable { from: String, to: String },
    AddColumn { table: String, column: Column },
    DropColumn { table: String, column: Column },
    RenameColumn { table: String, from: String, to: String },
    /// Rebuilds `from` into `to` by copying the shared columns.
    /// `dependents` are the tables whose rows an `ON DELETE` action rewrites
    /// when the old table is dropped with foreign keys enforced.
    AlterTable {
        from: Table,
        to: Table,
        dependents: Vec<String>,
    },
    CreateIndex(Index),
    DropIndex(Index),
}

/// How the down section undoes an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStrategy {
    /// Drop the object the action created
    DropCreated,
    InverseRename,
    /// Rebuild the table back into its previous definition
    RebuildPrevious,
    /// Manual step: the down section only carries a comment directive
    RestoreFromBackup,
}

impl MigrationAction {
    /// Whether running the action can lose data or schema objects
    pub fn is_destructive(&self) -> bool {
        match self {
            MigrationAction::DropTable(_)
            | MigrationAction::DropColumn { .. }
            | MigrationAction::DropIndex(_) => true,
            MigrationAction::AlterTable {
                from,
                to,
                dependents,
            } => !dropped_columns(from, to).is_empty() || !dependents.is_empty(),
            _ => false,
        }
    }

    /// Whether a backup should be taken before running the action
    pub fn requires_backup(&self) -> bool {
        self.is_destructive() || matches!(self, MigrationAction::AlterTable { .. })
    }

    pub fn rollback_strategy(&self) -> RollbackStrategy {
        if self.is_destructive() {
            return RollbackStrategy::RestoreFromBackup;
        }
        match self {
            MigrationAction::RenameTable { .. } | MigrationAction::RenameColumn { .. } => {
                RollbackStrategy::InverseRename
            }
            MigrationAction::AlterTable { .. } => RollbackStrategy::RebuildPrevious,
            _ => RollbackStrategy::DropCreated,
        }
    }

    /// The table the action touches, by its name after the action
    pub fn table(&self) -> &str {
        match self {
            MigrationAction::CreateTable(t) | MigrationAction::DropTable(t) => &t.name,
            MigrationAction::RenameTable { to, .. } => to,
            MigrationAction::AddColumn { table, .. }
            | MigrationAction::DropColumn { table, .. }
            | MigrationAction::RenameColumn { table, .. } => table,
            MigrationAction::AlterTable { to, .. } => &to.name,
            MigrationAction::CreateIndex(i) | MigrationAction::DropIndex(i) => &i.table,
        }
    }

    pub fn up_statements(&self) -> Vec<Statement> {
        match self {
            MigrationAction::CreateTable(table) => table.statements(),
            MigrationAction::DropTable(table) => vec![Statement::DropTable {
                name: table.name.clone(),
                if_exists: false,
            }],
            MigrationAction::RenameTable { from, to } => vec![Statement::RenameTable {
                from: from.clone(),
                to: to.clone(),
            }],
            MigrationAction::AddColumn { table, column } => vec![Statement::AddColumn {
                table: table.clone(),
                column: column.to_column_def(true),
            }],
            MigrationAction::DropColumn { table, column } => vec![Statement::DropColumn {
                table: table.clone(),
                column: column.name.clone(),
            }],
            MigrationAction::RenameColumn { table, from, to } => vec![Statement::RenameColumn {
                table: table.clone(),
                from: from.clone(),
                to: to.clone(),
            }],
            MigrationAction::AlterTable { from, to, .. } => rebuild_statements(from, to),
            MigrationAction::CreateIndex(index) => vec![index.to_statement()],
            MigrationAction::DropIndex(index) => vec![Statement::DropIndex {
                name: index.name.clone(),
                if_exists: false,
            }],
        }
    }

    pub fn down_statements(&self) -> Vec<Statement> {
        if self.rollback_strategy() == RollbackStrategy::RestoreFromBackup {
            return vec![Statement::Comment(format!(
                "MANUAL ROLLBACK: {}",
                self.manual_rollback_step()
            ))];
        }

        match self {
            MigrationAction::CreateTable(table) => vec![Statement::DropTable {
                name: table.name.clone(),
                if_exists: false,
            }],
            MigrationAction::RenameTable { from, to } => vec![Statement::RenameTable {
                from: to.clone(),
                to: from.clone(),
            }],
            MigrationAction::AddColumn { table, column } => vec![Statement::DropColumn {
                table: table.clone(),
                column: column.name.clone(),
            }],
            MigrationAction::RenameColumn { table, from, to } => vec![Statement::RenameColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            }],
            MigrationAction::AlterTable { from, to, .. } => rebuild_statements(to, from),
            MigrationAction::CreateIndex(index) => vec![index.drop_statement()],
            // Destructive actions returned above
            MigrationAction::DropTable(_)
            | MigrationAction::DropColumn { .. }
            | MigrationAction::DropIndex(_) => Vec::new(),
        }
    }

    fn manual_rollback_step(&self) -> String {
        match self {
            MigrationAction::DropTable(table) => {
                format!("restore table {} and its rows from a backup", table.name)
            }
            MigrationAction::DropColumn { table, column } => format!(
                "restore column {}.{} ({}) and its values from a backup",
                table,
                column.name,
                column.scalar_type
            ),
            MigrationAction::DropIndex(index) => format!(
                "recreate index {} on {} ({})",
                index.name,
                index.table,
                index.columns.join(", ")
            ),
            MigrationAction::AlterTable {
                from,
                to,
                dependents,
            } => {
                let mut steps = Vec::new();
                let dropped = dropped_columns(from, to);
                if !dropped.is_empty() {
                    steps.push(format!(
                        "restore columns {} of table {} from a backup",
                        dropped.join(", "),
                        to.name
                    ));
                }
                if !dependents.is_empty() {
                    steps.push(format!(
                        "restore rows of {} changed by ON DELETE actions while {} was rebuilt",
                        dependents.join(", "),
                        to.name
                    ));
                }
                steps.join("; ")
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationAction::CreateTable(t) => write!(f, "create table {}", t.name),
            MigrationAction::DropTable(t) => write!(f, "drop table {}", t.name),
            MigrationAction::RenameTable { from, to } => write!(f, "rename table {} to {}", from, to),
            MigrationAction::AddColumn { table, column } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            MigrationAction::DropColumn { table, column } => {
                write!(f, "drop column {}.{}", table, column.name)
            }
            MigrationAction::RenameColumn { table, from, to } => {
                write!(f, "rename column {}.{} to {}", table, from, to)
            }
            MigrationAction::AlterTable { to, .. } => write!(f, "rebuild table {}", to.name),
            MigrationAction::CreateIndex(i) => write!(f, "create index {}", i.name),
            MigrationAction::DropIndex(i) => write!(f, "drop index {}", i.name),
        }
    }
}

/// Columns of `from` that `to` no longer has
fn dropped_columns(from: &Table, to: &Table) -> Vec<String> {
    from.columns
        .iter()
        .filter(|c| to.column(&c.name).is_none())
        .map(|c| c.name.clone())
        .collect()
}

/// Rebuild the table named by `from` into the definition `to`.
///
/// SQLite cannot alter column definitions in place: the new definition is
/// created under a temporary name, shared columns are copied across, and the
/// copy replaces the original. Indexes go with the dropped table, so the
/// target's indexes are recreated at the end.
///
/// Foreign keys are switched off around the swap so dropping the old table
/// does not fire `ON DELETE` actions in referencing tables. SQLite ignores
/// that pragma inside a transaction; deferral then keeps plain references
/// valid until the new table takes the old name.
fn rebuild_statements(from: &Table, to: &Table) -> Vec<Statement> {
    let temporary = format!("_{}_new", to.name);

    let mut staged = to.clone();
    staged.name = temporary.clone();
    staged.comment = None;
    staged.indexes.clear();

    let shared: Vec<String> = to
        .columns
        .iter()
        .filter(|c| from.column(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect();

    let mut statements = vec![
        pragma("foreign_keys", Some("OFF")),
        pragma("defer_foreign_keys", Some("ON")),
        staged.to_statement(),
    ];
    if !shared.is_empty() {
        statements.push(Statement::CopyRows {
            from: from.name.clone(),
            into: temporary.clone(),
            columns: shared,
        });
    }
    statements.push(Statement::DropTable {
        name: from.name.clone(),
        if_exists: false,
    });
    statements.push(Statement::RenameTable {
        from: temporary,
        to: to.name.clone(),
    });
    statements.extend(to.index_statements());
    statements.push(pragma("foreign_key_check", None));
    statements.push(pragma("foreign_keys", Some("ON")));
    statements
}

fn pragma(name: &str, value: Option<&str>) -> Statement {
    Statement::Pragma {
        name: name.to_string(),
        value: value.map(str::to_string),
    }
}
