//! Schema difference calculator
//!
//! Compares two schema graphs and lists the changes that take the first to
//! the second. Renames cannot be told apart from a drop plus a create, so
//! they are only detected when named in [`RenameHints`].

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::schema::column::Column;
use crate::schema::graph::SchemaGraph;
use crate::schema::index::Index;
use crate::schema::table::Table;

/// A column rename, keyed by the table's new name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRename {
    pub table: String,
    pub from: String,
    pub to: String,
}

/// Renames the diff should apply instead of dropping and recreating
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameHints {
    pub tables: IndexMap<String, String>,
    pub columns: Vec<ColumnRename>,
}

impl RenameHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename_table(mut self, from: &str, to: &str) -> Self {
        self.tables.insert(from.to_string(), to.to_string());
        self
    }

    /// `table` is the table's name in the new schema
    pub fn rename_column(mut self, table: &str, from: &str, to: &str) -> Self {
        self.columns.push(ColumnRename {
            table: table.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }
}

/// Represents a change to a column's definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    pub column_name: String,
    pub from: Column,
    pub to: Column,
}

/// Changes to a table present in both schemas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    /// Name in the new schema
    pub table: String,
    pub columns_to_rename: Vec<(String, String)>,
    pub columns_to_add: Vec<Column>,
    pub columns_to_drop: Vec<Column>,
    pub columns_to_alter: Vec<ColumnChange>,
    /// Set when SQLite cannot apply the change with `ALTER TABLE`. The rebuild
    /// replaces the column additions and drops above.
    pub rebuild: Option<Rebuild>,
}

/// A table rebuilt by copying into a fresh definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuild {
    /// The old definition with renames already applied
    pub from: Table,
    pub to: Table,
}

/// Represents changes needed to synchronize two schemas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub tables_to_create: Vec<Table>,
    pub tables_to_drop: Vec<Table>,
    pub tables_to_rename: Vec<(String, String)>,
    pub table_changes: Vec<TableChange>,
    pub indexes_to_create: Vec<Index>,
    pub indexes_to_drop: Vec<Index>,
}

impl SchemaDiff {
    /// Generate the diff taking `current` to `target`
    pub fn generate(current: &SchemaGraph, target: &SchemaGraph, hints: &RenameHints) -> Self {
        let mut diff = SchemaDiff::default();

        let renames = AppliedRenames::resolve(current, target, hints);
        diff.tables_to_rename = renames.tables.clone();

        let mut matched = HashSet::new();
        for target_table in target.tables() {
            let source_name = renames.old_table_name(&target_table.name);

            let current_table = match current.table(&source_name) {
                Some(table) => table,
                None => {
                    diff.tables_to_create.push(target_table.clone());
                    continue;
                }
            };
            matched.insert(current_table.name.to_lowercase());

            let renamed = renames.apply(current_table, &target_table.name);
            let columns_to_rename = renames.columns_of(&target_table.name);
            let change = Self::compare_tables(&renamed, target_table, columns_to_rename);

            match &change {
                Some(TableChange {
                    rebuild: Some(_), ..
                }) => {}
                _ => Self::compare_indexes(&renamed, target_table, &mut diff),
            }
            if let Some(change) = change {
                diff.table_changes.push(change);
            }
        }

        diff.tables_to_drop = current
            .tables()
            .filter(|t| !matched.contains(&t.name.to_lowercase()))
            .cloned()
            .collect();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.tables_to_create.is_empty()
            && self.tables_to_drop.is_empty()
            && self.tables_to_rename.is_empty()
            && self.table_changes.is_empty()
            && self.indexes_to_create.is_empty()
            && self.indexes_to_drop.is_empty()
    }

    fn compare_tables(
        current: &Table,
        target: &Table,
        columns_to_rename: Vec<(String, String)>,
    ) -> Option<TableChange> {
        let columns_to_add: Vec<Column> = target
            .columns
            .iter()
            .filter(|c| current.column(&c.name).is_none())
            .cloned()
            .collect();
        let columns_to_drop: Vec<Column> = current
            .columns
            .iter()
            .filter(|c| target.column(&c.name).is_none())
            .cloned()
            .collect();
        let columns_to_alter: Vec<ColumnChange> = target
            .columns
            .iter()
            .filter_map(|to| {
                let from = current.column(&to.name)?;
                Self::column_needs_alteration(from, to).then(|| ColumnChange {
                    column_name: to.name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect();

        let needs_rebuild = !columns_to_alter.is_empty()
            || current.constraints != target.constraints
            || columns_to_add.iter().any(|c| !c.can_add_in_place())
            || columns_to_drop
                .iter()
                .any(|c| c.primary_key || c.unique || c.references.is_some());

        if columns_to_rename.is_empty()
            && columns_to_add.is_empty()
            && columns_to_drop.is_empty()
            && !needs_rebuild
        {
            return None;
        }

        let rebuild = needs_rebuild.then(|| Rebuild {
            from: current.clone(),
            to: target.clone(),
        });
        let (columns_to_add, columns_to_drop) = if rebuild.is_some() {
            (Vec::new(), Vec::new())
        } else {
            (columns_to_add, columns_to_drop)
        };

        Some(TableChange {
            table: target.name.clone(),
            columns_to_rename,
            columns_to_add,
            columns_to_drop,
            columns_to_alter,
            rebuild,
        })
    }

    /// Index changes for a table that is not rebuilt
    fn compare_indexes(current: &Table, target: &Table, diff: &mut SchemaDiff) {
        let find = |indexes: &[Index], name: &str| {
            indexes
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(name))
                .cloned()
        };

        for index in &current.indexes {
            match find(&target.indexes, &index.name) {
                Some(new) if new == *index => {}
                _ => diff.indexes_to_drop.push(index.clone()),
            }
        }
        for index in &target.indexes {
            match find(&current.indexes, &index.name) {
                Some(old) if old == *index => {}
                _ => diff.indexes_to_create.push(index.clone()),
            }
        }
    }

    /// Check if a column needs to be altered; comments are not part of the stored schema
    fn column_needs_alteration(from: &Column, to: &Column) -> bool {
        let mut from = from.clone();
        from.name = to.name.clone();
        from.comment = to.comment.clone();
        from != *to
    }
}

/// The rename hints that hold for a pair of graphs
struct AppliedRenames {
    /// `(old, new)` table names
    tables: Vec<(String, String)>,
    columns: Vec<ColumnRename>,
}

impl AppliedRenames {
    /// A table rename holds when the old name is gone and the new one is new;
    /// a column rename holds under the same test inside its table
    fn resolve(current: &SchemaGraph, target: &SchemaGraph, hints: &RenameHints) -> Self {
        let mut tables = Vec::new();
        for (from, to) in &hints.tables {
            let applies = current.table(from).is_some()
                && target.table(to).is_some()
                && target.table(from).is_none()
                && current.table(to).is_none();
            if applies {
                tables.push((from.clone(), to.clone()));
            } else {
                tracing::debug!(from = %from, to = %to, "Ignoring table rename hint");
            }
        }

        let mut renames = Self {
            tables,
            columns: Vec::new(),
        };
        for hint in &hints.columns {
            let source = current.table(&renames.old_table_name(&hint.table));
            let applies = match (source, target.table(&hint.table)) {
                (Some(old), Some(new)) => {
                    old.column(&hint.from).is_some()
                        && old.column(&hint.to).is_none()
                        && new.column(&hint.to).is_some()
                        && new.column(&hint.from).is_none()
                }
                _ => false,
            };
            if applies {
                renames.columns.push(hint.clone());
            } else {
                tracing::debug!(table = %hint.table, from = %hint.from, to = %hint.to, "Ignoring column rename hint");
            }
        }
        renames
    }

    /// Name in the current graph of the table called `name` in the target
    fn old_table_name(&self, name: &str) -> String {
        self.tables
            .iter()
            .find(|(_, to)| to.eq_ignore_ascii_case(name))
            .map_or_else(|| name.to_string(), |(from, _)| from.clone())
    }

    fn new_table_name(&self, name: &str) -> String {
        self.tables
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(name))
            .map_or_else(|| name.to_string(), |(_, to)| to.clone())
    }

    fn new_column_name(&self, table: &str, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|r| r.table.eq_ignore_ascii_case(table) && r.from.eq_ignore_ascii_case(column))
            .map(|r| r.to.as_str())
    }

    fn columns_of(&self, table: &str) -> Vec<(String, String)> {
        self.columns
            .iter()
            .filter(|r| r.table.eq_ignore_ascii_case(table))
            .map(|r| (r.from.clone(), r.to.clone()))
            .collect()
    }

    /// The old table as it looks after the renames ran. SQLite rewrites
    /// foreign key targets on rename, so references follow too.
    fn apply(&self, current: &Table, new_name: &str) -> Table {
        let mut table = current.clone();
        table.name = new_name.to_string();

        let rename = |name: &mut String| {
            if let Some(to) = self.new_column_name(new_name, name) {
                *name = to.to_string();
            }
        };
        for column in &mut table.columns {
            rename(&mut column.name);
        }
        for index in &mut table.indexes {
            index.columns.iter_mut().for_each(rename);
            index.include.iter_mut().for_each(rename);
            if index.table.eq_ignore_ascii_case(&current.name) {
                index.table = new_name.to_string();
            }
        }
        for constraint in &mut table.constraints {
            constraint.columns_mut().iter_mut().for_each(rename);
        }

        for column in &mut table.columns {
            if let Some(target) = &mut column.references {
                target.table = self.new_table_name(&target.table);
                if let Some(to) = self.new_column_name(&target.table, &target.column) {
                    target.column = to.to_string();
                }
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::ScalarType;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("email", ScalarType::Text).unique())
            .with_column(Column::new("name", ScalarType::Text))
    }

    fn graph(tables: Vec<Table>) -> SchemaGraph {
        let mut graph = SchemaGraph::new();
        for table in tables {
            graph.add_table(table).unwrap();
        }
        graph
    }

    #[test]
    fn test_identical_graphs_have_empty_diff() {
        let a = graph(vec![users()]);
        assert!(SchemaDiff::generate(&a, &a.clone(), &RenameHints::new()).is_empty());
    }

    #[test]
    fn test_column_order_and_comments_are_ignored() {
        let mut reordered = users();
        reordered.columns.reverse();
        reordered.columns[0].comment = Some("display name".to_string());

        let diff = SchemaDiff::generate(
            &graph(vec![users()]),
            &graph(vec![reordered]),
            &RenameHints::new(),
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn test_created_and_dropped_tables() {
        let posts = Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment());
        let sessions = Table::new("sessions")
            .with_column(Column::new("token", ScalarType::Text).primary_key());

        let diff = SchemaDiff::generate(
            &graph(vec![users(), sessions]),
            &graph(vec![users(), posts]),
            &RenameHints::new(),
        );
        assert_eq!(diff.tables_to_create.len(), 1);
        assert_eq!(diff.tables_to_create[0].name, "posts");
        assert_eq!(diff.tables_to_drop.len(), 1);
        assert_eq!(diff.tables_to_drop[0].name, "sessions");
        assert!(diff.table_changes.is_empty());
    }

    #[test]
    fn test_nullable_column_is_added_in_place() {
        let target = users().with_column(Column::new("bio", ScalarType::Text).nullable());
        let diff = SchemaDiff::generate(
            &graph(vec![users()]),
            &graph(vec![target]),
            &RenameHints::new(),
        );

        let change = &diff.table_changes[0];
        assert_eq!(change.columns_to_add.len(), 1);
        assert_eq!(change.columns_to_add[0].name, "bio");
        assert!(change.rebuild.is_none());
    }

    #[test]
    fn test_altered_column_requires_rebuild() {
        let mut target = users();
        target.columns[2].nullable = true;
        let diff = SchemaDiff::generate(
            &graph(vec![users()]),
            &graph(vec![target.clone()]),
            &RenameHints::new(),
        );

        let change = &diff.table_changes[0];
        assert_eq!(change.columns_to_alter.len(), 1);
        assert_eq!(change.columns_to_alter[0].column_name, "name");
        let rebuild = change.rebuild.as_ref().unwrap();
        assert_eq!(rebuild.to, target);
        assert_eq!(rebuild.from, users());
    }

    #[test]
    fn test_dropping_unique_column_requires_rebuild() {
        let mut target = users();
        target.columns.remove(1);
        let diff = SchemaDiff::generate(
            &graph(vec![users()]),
            &graph(vec![target]),
            &RenameHints::new(),
        );

        let change = &diff.table_changes[0];
        assert!(change.rebuild.is_some());
        assert!(change.columns_to_drop.is_empty());
    }

    #[test]
    fn test_rename_hints() {
        let mut target = users();
        target.name = "accounts".to_string();
        target.columns[2].name = "display_name".to_string();

        let without_hints =
            SchemaDiff::generate(&graph(vec![users()]), &graph(vec![target.clone()]), &RenameHints::new());
        assert_eq!(without_hints.tables_to_create.len(), 1);
        assert_eq!(without_hints.tables_to_drop.len(), 1);

        let hints = RenameHints::new()
            .rename_table("users", "accounts")
            .rename_column("accounts", "name", "display_name");
        let diff = SchemaDiff::generate(&graph(vec![users()]), &graph(vec![target]), &hints);
        assert_eq!(diff.tables_to_rename, vec![("users".to_string(), "accounts".to_string())]);
        assert!(diff.tables_to_create.is_empty());
        assert!(diff.tables_to_drop.is_empty());
        assert_eq!(
            diff.table_changes[0].columns_to_rename,
            vec![("name".to_string(), "display_name".to_string())]
        );
        assert!(diff.table_changes[0].rebuild.is_none());
    }

    fn posts() -> Table {
        Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("user_id", ScalarType::Integer).references("users", "id"))
    }

    #[test]
    fn test_references_follow_renamed_table() {
        let mut accounts = users();
        accounts.name = "accounts".to_string();
        let target_posts = Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("user_id", ScalarType::Integer).references("accounts", "id"));

        let hints = RenameHints::new().rename_table("users", "accounts");
        let diff = SchemaDiff::generate(
            &graph(vec![users(), posts()]),
            &graph(vec![accounts, target_posts]),
            &hints,
        );
        assert_eq!(diff.tables_to_rename, vec![("users".to_string(), "accounts".to_string())]);
        assert!(diff.table_changes.is_empty());
    }

    #[test]
    fn test_references_follow_renamed_column() {
        let mut target_users = users();
        target_users.columns[0].name = "user_id".to_string();
        let target_posts = Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("user_id", ScalarType::Integer).references("users", "user_id"));

        let hints = RenameHints::new().rename_column("users", "id", "user_id");
        let diff = SchemaDiff::generate(
            &graph(vec![users(), posts()]),
            &graph(vec![target_users, target_posts]),
            &hints,
        );
        assert_eq!(diff.table_changes.len(), 1);
        assert_eq!(diff.table_changes[0].table, "users");
        assert!(diff.table_changes[0].rebuild.is_none());
    }

    #[test]
    fn test_timestamp_default_requires_rebuild() {
        let target = users().with_column(
            Column::new("created_at", ScalarType::Numeric).default_value("CURRENT_TIMESTAMP"),
        );
        let diff = SchemaDiff::generate(
            &graph(vec![users()]),
            &graph(vec![target]),
            &RenameHints::new(),
        );

        let change = &diff.table_changes[0];
        assert!(change.rebuild.is_some());
        assert!(change.columns_to_add.is_empty());
    }

    #[test]
    fn test_index_changes() {
        let current = users()
            .with_index(Index::new("idx_users_name", "users", &["name"]))
            .unwrap();
        let target = users()
            .with_index(Index::new("idx_users_name", "users", &["name", "email"]))
            .unwrap();

        let diff = SchemaDiff::generate(
            &graph(vec![current]),
            &graph(vec![target]),
            &RenameHints::new(),
        );
        assert_eq!(diff.indexes_to_drop.len(), 1);
        assert_eq!(diff.indexes_to_create.len(), 1);
        assert_eq!(diff.indexes_to_create[0].columns, vec!["name", "email"]);
        assert!(diff.table_changes.is_empty());
    }
}
