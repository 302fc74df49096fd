//! Column definitions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchemaError;
use crate::schema::catalog::ScalarType;
use crate::sql::ast::{ColumnConstraint, ColumnDef};

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDeleteAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    #[default]
    NoAction,
}

impl OnDeleteAction {
    pub fn sql(self) -> &'static str {
        match self {
            OnDeleteAction::Cascade => "CASCADE",
            OnDeleteAction::SetNull => "SET NULL",
            OnDeleteAction::SetDefault => "SET DEFAULT",
            OnDeleteAction::Restrict => "RESTRICT",
            OnDeleteAction::NoAction => "NO ACTION",
        }
    }

    fn is_default(&self) -> bool {
        *self == OnDeleteAction::NoAction
    }

    /// Whether deleting a referenced row writes to the referencing rows
    pub fn modifies_children(self) -> bool {
        matches!(
            self,
            OnDeleteAction::Cascade | OnDeleteAction::SetNull | OnDeleteAction::SetDefault
        )
    }
}

impl fmt::Display for OnDeleteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
    #[serde(default, skip_serializing_if = "OnDeleteAction::is_default")]
    pub on_delete: OnDeleteAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    /// Create a new NOT NULL column with the given name and type
    pub fn new(name: &str, scalar_type: ScalarType) -> Self {
        Self {
            name: name.to_string(),
            scalar_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            check: None,
            references: None,
            on_delete: OnDeleteAction::NoAction,
            comment: None,
        }
    }

    /// Allow NULL values
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as (part of) the primary key; primary key columns are never nullable
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark as an auto-incrementing primary key
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.primary_key()
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set a default value expression for the column
    pub fn default_value(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    pub fn check(mut self, expr: &str) -> Self {
        self.check = Some(expr.to_string());
        self
    }

    /// Reference another table's column
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }

    pub fn on_delete(mut self, action: OnDeleteAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.comment = Some(text.to_string());
        self
    }

    /// Rules that hold for a column on its own
    pub fn check_rules(&self, table: &str) -> Vec<SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidColumn {
            table: table.to_string(),
            column: self.name.clone(),
            reason: reason.to_string(),
        };
        let mut errors = Vec::new();

        if self.auto_increment && !self.primary_key {
            errors.push(invalid("auto-increment requires a primary key"));
        }
        if self.auto_increment && self.scalar_type != ScalarType::Integer {
            errors.push(invalid("auto-increment requires an INTEGER column"));
        }
        if self.primary_key && self.nullable {
            errors.push(invalid("a primary key column cannot be nullable"));
        }
        if self.scalar_type == ScalarType::Null && !self.nullable {
            errors.push(invalid("a NULL typed column must be nullable"));
        }
        if self.references.is_none() && self.on_delete != OnDeleteAction::NoAction {
            errors.push(invalid("on_delete is only meaningful on a foreign key"));
        }
        if self.on_delete == OnDeleteAction::SetNull && !self.nullable {
            errors.push(invalid("ON DELETE SET NULL needs a nullable column"));
        }
        if self.on_delete == OnDeleteAction::SetDefault && self.default.is_none() {
            errors.push(invalid("ON DELETE SET DEFAULT needs a default value"));
        }

        errors
    }

    /// Whether SQLite can add this column with `ALTER TABLE ... ADD COLUMN`
    pub fn can_add_in_place(&self) -> bool {
        if self.primary_key || self.unique {
            return false;
        }
        if !self.nullable && self.default.is_none() {
            return false;
        }
        if !self.has_constant_default() {
            return false;
        }
        // A new foreign key column must start out NULL
        !(self.references.is_some() && self.default.is_some())
    }

    /// Whether the default is absent or a constant. SQLite evaluates
    /// `CURRENT_*` and parenthesised expressions per row, which
    /// `ADD COLUMN` rejects.
    pub fn has_constant_default(&self) -> bool {
        let default = match &self.default {
            Some(default) => default.trim(),
            None => return true,
        };
        let upper = default.to_ascii_uppercase();
        !(default.starts_with('(')
            || matches!(upper.as_str(), "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"))
    }

    /// Build the column definition; `inline_primary_key` is false for composite keys
    pub fn to_column_def(&self, inline_primary_key: bool) -> ColumnDef {
        let mut constraints = Vec::new();

        let is_inline_pk = self.primary_key && inline_primary_key;
        if is_inline_pk {
            constraints.push(ColumnConstraint::PrimaryKey {
                autoincrement: self.auto_increment,
            });
        }
        if !self.nullable {
            constraints.push(ColumnConstraint::NotNull);
        }
        if self.unique && !is_inline_pk {
            constraints.push(ColumnConstraint::Unique);
        }
        if let Some(default) = &self.default {
            constraints.push(ColumnConstraint::Default(default.clone()));
        }
        if let Some(check) = &self.check {
            constraints.push(ColumnConstraint::Check(check.clone()));
        }
        if let Some(target) = &self.references {
            constraints.push(ColumnConstraint::References {
                table: target.table.clone(),
                column: target.column.clone(),
                on_delete: (!self.on_delete.is_default()).then(|| self.on_delete.sql()),
            });
        }

        ColumnDef {
            name: self.name.clone(),
            type_name: self.scalar_type.sql_name(),
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::printer;
    use crate::sql::Statement;

    fn render_column(column: &Column) -> String {
        printer::render(&Statement::AddColumn {
            table: "t".to_string(),
            column: column.to_column_def(true),
        })
        .unwrap()
    }

    #[test]
    fn test_builder_enforces_primary_key_invariants() {
        let id = Column::new("id", ScalarType::Integer).nullable().auto_increment();
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert!(id.check_rules("users").is_empty());
    }

    #[test]
    fn test_rules_catch_hand_built_columns() {
        let mut column = Column::new("code", ScalarType::Text);
        column.auto_increment = true;
        column.nullable = true;
        column.on_delete = OnDeleteAction::Cascade;

        let errors = column.check_rules("items");
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| matches!(e, SchemaError::InvalidColumn { column, .. } if column == "code")));
    }

    #[test]
    fn test_set_null_requires_nullable() {
        let column = Column::new("user_id", ScalarType::Integer)
            .references("users", "id")
            .on_delete(OnDeleteAction::SetNull);
        assert_eq!(column.check_rules("posts").len(), 1);
        assert!(column.nullable().check_rules("posts").is_empty());
    }

    #[test]
    fn test_column_definition_rendering() {
        let column = Column::new("user_id", ScalarType::Integer)
            .references("users", "id")
            .on_delete(OnDeleteAction::Cascade);
        assert_eq!(
            render_column(&column),
            "ALTER TABLE t ADD COLUMN user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE;"
        );

        let column = Column::new("status", ScalarType::Text)
            .default_value("'draft'")
            .check("status IN ('draft', 'published')");
        assert_eq!(
            render_column(&column),
            "ALTER TABLE t ADD COLUMN status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published'));"
        );
    }

    #[test]
    fn test_can_add_in_place() {
        assert!(Column::new("bio", ScalarType::Text).nullable().can_add_in_place());
        assert!(Column::new("score", ScalarType::Integer)
            .default_value("0")
            .can_add_in_place());
        assert!(!Column::new("score", ScalarType::Integer).can_add_in_place());
        assert!(!Column::new("email", ScalarType::Text)
            .nullable()
            .unique()
            .can_add_in_place());
        assert!(Column::new("team_id", ScalarType::Integer)
            .nullable()
            .references("teams", "id")
            .can_add_in_place());
    }

    #[test]
    fn test_non_constant_defaults_cannot_be_added_in_place() {
        for default in ["CURRENT_TIMESTAMP", "current_date", "CURRENT_TIME", "(strftime('%s', 'now'))"] {
            let column = Column::new("created_at", ScalarType::Numeric).default_value(default);
            assert!(!column.has_constant_default(), "{}", default);
            assert!(!column.can_add_in_place(), "{}", default);
        }
        let column = Column::new("created_at", ScalarType::Numeric).default_value("'1970-01-01'");
        assert!(column.has_constant_default());
        assert!(column.can_add_in_place());
    }

    #[test]
    fn test_deserialize_minimal_column() {
        let column: Column = serde_json::from_str(
            r#"{"name": "email", "type": "varchar(255)", "unique": true}"#,
        )
        .unwrap();
        assert_eq!(column, Column::new("email", ScalarType::Text).unique());
    }
}
