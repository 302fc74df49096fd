//! Table definitions and their DDL / interface rendering

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::codegen::declaration::{
    field_identifier, DeclarationKind, FieldDeclaration, TypeDeclaration,
};
use crate::error::{Result, SchemaError};
use crate::schema::catalog::TargetLanguage;
use crate::schema::column::{Column, ForeignKeyRef};
use crate::schema::index::{Index, IndexKind};
use crate::sql::ast::{CreateTable, Statement, TableConstraintDef};
use crate::sql::printer;
use crate::utils::naming;

/// Table-level constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableConstraint {
    PrimaryKey { columns: Vec<String> },
    Unique { columns: Vec<String> },
    Check { expression: String },
}

impl TableConstraint {
    fn columns(&self) -> &[String] {
        match self {
            TableConstraint::PrimaryKey { columns } | TableConstraint::Unique { columns } => {
                columns
            }
            TableConstraint::Check { .. } => &[],
        }
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [String] {
        match self {
            TableConstraint::PrimaryKey { columns } | TableConstraint::Unique { columns } => {
                columns
            }
            TableConstraint::Check { .. } => &mut [],
        }
    }

    fn to_definition(&self) -> TableConstraintDef {
        match self {
            TableConstraint::PrimaryKey { columns } => TableConstraintDef::PrimaryKey(columns.clone()),
            TableConstraint::Unique { columns } => TableConstraintDef::Unique(columns.clone()),
            TableConstraint::Check { expression } => TableConstraintDef::Check(expression.clone()),
        }
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<TableConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
            comment: None,
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Add an index; every column it names must already exist on this table
    pub fn add_index(&mut self, index: Index) -> std::result::Result<(), SchemaError> {
        if let Some(error) = index.check_rules(self).into_iter().next() {
            return Err(error);
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn with_index(mut self, index: Index) -> std::result::Result<Self, SchemaError> {
        self.add_index(index)?;
        Ok(self)
    }

    pub fn add_constraint(&mut self, constraint: TableConstraint) {
        self.constraints.push(constraint);
    }

    pub fn with_constraint(mut self, constraint: TableConstraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Look up a column by name; SQLite column names are case-insensitive
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn table_primary_key(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            TableConstraint::PrimaryKey { columns } => Some(columns.as_slice()),
            _ => None,
        })
    }

    /// Primary key column names, whether declared on columns or as a table constraint
    pub fn primary_key(&self) -> Vec<String> {
        match self.table_primary_key() {
            Some(columns) => columns.to_vec(),
            None => self
                .columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.clone())
                .collect(),
        }
    }

    /// Whether a single-column lookup on `column` returns at most one row
    pub fn is_unique_column(&self, column: &str) -> bool {
        let single = |columns: &[String]| columns.len() == 1 && columns[0].eq_ignore_ascii_case(column);

        let pk = self.primary_key();
        if single(&pk) {
            return true;
        }
        if self.column(column).map_or(false, |c| c.unique) {
            return true;
        }
        let constraint_unique = self.constraints.iter().any(|c| match c {
            TableConstraint::Unique { columns } => single(columns),
            _ => false,
        });
        let index_unique = self
            .indexes
            .iter()
            .any(|i| i.kind == IndexKind::Unique && single(&i.columns));

        constraint_unique || index_unique
    }

    /// Columns referencing other tables, as `(column, target)` pairs
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKeyRef)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|r| (c, r)))
    }

    /// Every rule that can be checked without looking at other tables
    pub fn check(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_lowercase()) {
                errors.push(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
            errors.extend(column.check_rules(&self.name));
        }

        let flagged: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        let table_keys: Vec<&TableConstraint> = self
            .constraints
            .iter()
            .filter(|c| matches!(c, TableConstraint::PrimaryKey { .. }))
            .collect();
        match table_keys.as_slice() {
            [] if flagged.len() > 1 => errors.push(SchemaError::AmbiguousPrimaryKey {
                table: self.name.clone(),
                columns: flagged.clone(),
            }),
            [] => {}
            [TableConstraint::PrimaryKey { columns }] => {
                let outside = flagged
                    .iter()
                    .any(|f| !columns.iter().any(|c| c.eq_ignore_ascii_case(f)));
                if outside {
                    errors.push(SchemaError::AmbiguousPrimaryKey {
                        table: self.name.clone(),
                        columns: flagged.clone(),
                    });
                }
                let autoincrement = self.columns.iter().find(|c| c.auto_increment);
                if let Some(column) = autoincrement.filter(|_| columns.len() > 1) {
                    errors.push(SchemaError::InvalidColumn {
                        table: self.name.clone(),
                        column: column.name.clone(),
                        reason: "auto-increment cannot be part of a composite key".to_string(),
                    });
                }
            }
            _ => errors.push(SchemaError::AmbiguousPrimaryKey {
                table: self.name.clone(),
                columns: table_keys
                    .iter()
                    .flat_map(|c| c.columns().iter().cloned())
                    .collect(),
            }),
        }

        for constraint in &self.constraints {
            if matches!(constraint, TableConstraint::PrimaryKey { columns } | TableConstraint::Unique { columns } if columns.is_empty())
            {
                errors.push(SchemaError::InvalidColumn {
                    table: self.name.clone(),
                    column: String::new(),
                    reason: "a table constraint needs at least one column".to_string(),
                });
            }
            for column in constraint.columns() {
                match self.column(column) {
                    None => errors.push(SchemaError::InvalidColumn {
                        table: self.name.clone(),
                        column: column.clone(),
                        reason: "named by a table constraint but not declared".to_string(),
                    }),
                    Some(c) if c.nullable && matches!(constraint, TableConstraint::PrimaryKey { .. }) => {
                        errors.push(SchemaError::InvalidColumn {
                            table: self.name.clone(),
                            column: column.clone(),
                            reason: "a primary key column cannot be nullable".to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if !index_names.insert(index.name.to_lowercase()) {
                errors.push(SchemaError::DuplicateIndex {
                    index: index.name.clone(),
                });
            }
            errors.extend(index.check_rules(self));
        }

        errors
    }

    /// The `CREATE TABLE` statement, without indexes
    pub fn to_statement(&self) -> Statement {
        let composite = self.table_primary_key().is_some();

        let mut constraints: Vec<TableConstraintDef> = Vec::new();
        for constraint in &self.constraints {
            constraints.push(constraint.to_definition());
        }

        Statement::CreateTable(CreateTable {
            name: self.name.clone(),
            if_not_exists: false,
            columns: self
                .columns
                .iter()
                .map(|c| c.to_column_def(!composite))
                .collect(),
            constraints,
            comment: self.comment.clone(),
        })
    }

    /// `CREATE INDEX` statements for this table, in declaration order
    pub fn index_statements(&self) -> Vec<Statement> {
        self.indexes.iter().map(Index::to_statement).collect()
    }

    /// The table followed by its indexes
    pub fn statements(&self) -> Vec<Statement> {
        let mut statements = vec![self.to_statement()];
        statements.extend(self.index_statements());
        statements
    }

    /// Render the table's DDL: `CREATE TABLE` then each index, separated by blank lines
    pub fn render(&self) -> Result<String> {
        if let Some(error) = self.check().into_iter().next() {
            return Err(error.into());
        }
        Ok(printer::render_all(&self.statements())?)
    }

    /// Derive the record type for this table in the given language
    pub fn to_interface(&self, language: TargetLanguage) -> Result<TypeDeclaration> {
        let fields: Vec<FieldDeclaration> = self
            .columns
            .iter()
            .map(|column| FieldDeclaration {
                name: field_identifier(&column.name, language),
                column: column.name.clone(),
                ty: column.scalar_type.language_type(language).to_string(),
                optional: column.nullable,
                doc: column.comment.clone(),
            })
            .collect();

        let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        if let Some((_, name)) = naming::check_identifier_conflicts(&names, false).into_iter().next() {
            return Err(SchemaError::NameCollision {
                scope: format!("record fields of table '{}'", self.name),
                name,
            }
            .into());
        }

        Ok(TypeDeclaration {
            name: naming::record_name(&self.name),
            table: self.name.clone(),
            language,
            kind: DeclarationKind::Record,
            fields,
            doc: self.comment.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::catalog::ScalarType;
    use crate::schema::column::OnDeleteAction;
    use pretty_assertions::assert_eq;

    fn posts() -> Table {
        Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(
                Column::new("user_id", ScalarType::Integer)
                    .references("users", "id")
                    .on_delete(OnDeleteAction::Cascade),
            )
            .with_column(Column::new("title", ScalarType::Text))
            .with_column(Column::new("body", ScalarType::Text).nullable())
            .with_index(Index::new("idx_posts_user_id", "posts", &["user_id"]))
            .unwrap()
    }

    #[test]
    fn test_render_table_with_indexes() {
        assert_eq!(
            posts().render().unwrap(),
            "CREATE TABLE posts (\n  \
             id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,\n  \
             user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,\n  \
             title TEXT NOT NULL,\n  \
             body TEXT\n);\n\n\
             CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts (user_id);"
        );
    }

    #[test]
    fn test_render_is_stable_across_serde_round_trip() {
        let table = posts();
        let json = serde_json::to_string(&table).unwrap();
        let reloaded: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(table.render().unwrap(), reloaded.render().unwrap());
    }

    #[test]
    fn test_composite_primary_key() {
        let table = Table::new("post_tags")
            .with_column(Column::new("post_id", ScalarType::Integer).primary_key())
            .with_column(Column::new("tag_id", ScalarType::Integer).primary_key())
            .with_constraint(TableConstraint::PrimaryKey {
                columns: vec!["post_id".to_string(), "tag_id".to_string()],
            });

        assert!(table.check().is_empty());
        assert_eq!(table.primary_key(), vec!["post_id", "tag_id"]);
        assert_eq!(
            table.render().unwrap(),
            "CREATE TABLE post_tags (\n  \
             post_id INTEGER NOT NULL,\n  \
             tag_id INTEGER NOT NULL,\n  \
             PRIMARY KEY (post_id, tag_id)\n);"
        );
    }

    #[test]
    fn test_duplicate_column_fails_render() {
        let table = Table::new("users")
            .with_column(Column::new("email", ScalarType::Text))
            .with_column(Column::new("Email", ScalarType::Text));

        let err = table.render().unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::DuplicateColumn { ref column, .. }) if column == "Email"
        ));
    }

    #[test]
    fn test_ambiguous_primary_key_fails_render() {
        let table = Table::new("pairs")
            .with_column(Column::new("a", ScalarType::Integer).primary_key())
            .with_column(Column::new("b", ScalarType::Integer).primary_key());

        let err = table.render().unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::AmbiguousPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_add_index_on_ghost_column() {
        let mut table = posts();
        let err = table
            .add_index(Index::new("idx_posts_ghost", "posts", &["ghost"]))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidIndexColumn {
                index: "idx_posts_ghost".to_string(),
                column: "ghost".to_string(),
            }
        );
        assert_eq!(table.indexes.len(), 1);
    }

    #[test]
    fn test_interface_has_one_field_per_column() {
        let table = posts();
        for language in [TargetLanguage::TypeScript, TargetLanguage::Rust] {
            let declaration = table.to_interface(language).unwrap();
            assert_eq!(declaration.name, "Post");
            assert_eq!(declaration.fields.len(), table.columns.len());
            for (field, column) in declaration.fields.iter().zip(&table.columns) {
                assert_eq!(field.optional, column.nullable);
            }
        }
    }

    #[test]
    fn test_interface_name_collision() {
        let table = Table::new("accounts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("userId", ScalarType::Integer))
            .with_column(Column::new("user_id", ScalarType::Integer));

        assert!(table.to_interface(TargetLanguage::TypeScript).is_ok());
        let err = table.to_interface(TargetLanguage::Rust).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::NameCollision { ref name, .. }) if name == "user_id"
        ));
    }

    #[test]
    fn test_unique_column_detection() {
        let table = posts()
            .with_column(Column::new("slug", ScalarType::Text).unique())
            .with_column(Column::new("code", ScalarType::Text))
            .with_constraint(TableConstraint::Unique {
                columns: vec!["code".to_string()],
            });

        assert!(table.is_unique_column("id"));
        assert!(table.is_unique_column("slug"));
        assert!(table.is_unique_column("code"));
        assert!(!table.is_unique_column("title"));
    }
}
