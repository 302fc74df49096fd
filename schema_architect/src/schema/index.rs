//! Index definitions

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::table::Table;
use crate::sql::ast::{CreateIndex, IndexTerm, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    Standard,
    Unique,
    /// Filtered by `condition`
    Partial,
    /// Keys are SQL expressions rather than column names
    Expression,
    /// Key columns followed by `include` columns
    Covering,
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub kind: IndexKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

impl Index {
    pub fn new(name: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: IndexKind::Standard,
            condition: None,
            include: Vec::new(),
        }
    }

    pub fn unique(mut self) -> Self {
        self.kind = IndexKind::Unique;
        self
    }

    /// Turn into a partial index filtered by `condition`
    pub fn partial(mut self, condition: &str) -> Self {
        self.kind = IndexKind::Partial;
        self.condition = Some(condition.to_string());
        self
    }

    /// Treat `columns` as SQL expressions
    pub fn expression(mut self) -> Self {
        self.kind = IndexKind::Expression;
        self
    }

    /// Turn into a covering index carrying `include` after the key columns
    pub fn covering(mut self, include: &[&str]) -> Self {
        self.kind = IndexKind::Covering;
        self.include = include.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn is_unique(&self) -> bool {
        self.kind == IndexKind::Unique
    }

    /// Whether the leading key of this index is `column`
    pub fn leads_with(&self, column: &str) -> bool {
        self.kind != IndexKind::Expression
            && self
                .columns
                .first()
                .map_or(false, |c| c.eq_ignore_ascii_case(column))
    }

    /// Check this index against the table it is attached to
    pub fn check_rules(&self, table: &Table) -> Vec<SchemaError> {
        let invalid = |reason: &str| SchemaError::InvalidIndex {
            index: self.name.clone(),
            reason: reason.to_string(),
        };
        let mut errors = Vec::new();

        if self.table != table.name {
            errors.push(SchemaError::MisplacedIndex {
                index: self.name.clone(),
                index_table: self.table.clone(),
                table: table.name.clone(),
            });
        }
        if self.columns.is_empty() {
            errors.push(invalid("an index needs at least one column"));
        }

        match (self.kind, &self.condition) {
            (IndexKind::Partial, None) => errors.push(invalid("a partial index needs a condition")),
            (IndexKind::Partial, Some(_)) | (_, None) => {}
            (_, Some(_)) => errors.push(invalid("only partial indexes take a condition")),
        }
        match self.kind {
            IndexKind::Covering if self.include.is_empty() => {
                errors.push(invalid("a covering index needs include columns"))
            }
            IndexKind::Covering => {}
            _ if !self.include.is_empty() => {
                errors.push(invalid("only covering indexes take include columns"))
            }
            _ => {}
        }

        let named_columns: Vec<&String> = match self.kind {
            IndexKind::Expression => self.include.iter().collect(),
            _ => self.columns.iter().chain(self.include.iter()).collect(),
        };
        for column in named_columns {
            if table.column(column).is_none() {
                errors.push(SchemaError::InvalidIndexColumn {
                    index: self.name.clone(),
                    column: column.clone(),
                });
            }
        }

        errors
    }

    pub fn to_statement(&self) -> Statement {
        let terms = match self.kind {
            IndexKind::Expression => self
                .columns
                .iter()
                .map(|e| IndexTerm::Expression(e.clone()))
                .collect(),
            // SQLite has no INCLUDE clause; covered columns become trailing keys
            _ => self
                .columns
                .iter()
                .chain(self.include.iter())
                .map(|c| IndexTerm::Column(c.clone()))
                .collect(),
        };

        Statement::CreateIndex(CreateIndex {
            name: self.name.clone(),
            table: self.table.clone(),
            unique: self.is_unique(),
            terms,
            condition: self.condition.clone(),
        })
    }

    pub fn drop_statement(&self) -> Statement {
        Statement::DropIndex {
            name: self.name.clone(),
            if_exists: true,
        }
    }
}
