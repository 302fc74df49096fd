//! Language-neutral description of a table's repository
//!
//! A plan fixes every operation's name, SQL and parameters for one target
//! language. The renderers only turn a plan into source text, so naming
//! collisions are caught here once for both languages.

use inflector::Inflector;

use crate::codegen::declaration::{
    argument_identifier, field_identifier, DeclarationKind, FieldDeclaration, TypeDeclaration,
};
use crate::error::{GenerationError, Result, SchemaError};
use crate::schema::catalog::{ScalarType, TargetLanguage};
use crate::schema::column::Column;
use crate::schema::table::Table;
use crate::sql::ast::{Delete, Insert, Select, Statement, Update};
use crate::sql::printer;
use crate::utils::naming::{self, apply_naming_convention, NamingStyle};

/// Comment placed above a generated `create` whose table has no generated key
pub const UNGENERATED_KEY_NOTE: &str =
    "Key columns are not generated and not accepted here; insert rows of this table with direct SQL.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    FindById,
    FindAll,
    /// Lookup by a unique column other than the primary key
    FindByUnique,
    Create,
    Update,
    Delete,
}

/// A value bound into an operation's SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Argument name for keys, field name for inputs
    pub name: String,
    pub column: String,
    pub ty: String,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: String,
    pub sql: String,
    /// Values taken from the input type, bound first
    pub inputs: Vec<Parameter>,
    /// Filter values, bound after the inputs
    pub keys: Vec<Parameter>,
}

impl Operation {
    /// Every bound parameter in placeholder order; a paginated query then
    /// takes the limit and offset
    pub fn bindings(&self) -> impl Iterator<Item = &Parameter> {
        self.inputs.iter().chain(self.keys.iter())
    }

    pub fn is_paginated(&self) -> bool {
        self.kind == OperationKind::FindAll
    }
}

/// Everything a renderer needs for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPlan {
    pub table: String,
    pub language: TargetLanguage,
    /// File stem of the generated repository module
    pub module: String,
    pub record: TypeDeclaration,
    pub create_input: TypeDeclaration,
    /// Absent when every column belongs to the primary key
    pub update_input: Option<TypeDeclaration>,
    /// Whether SQLite assigns the key on insert: a single INTEGER key column
    /// aliases the rowid. Otherwise `create` cannot produce a row.
    pub generated_key: bool,
    pub operations: Vec<Operation>,
}

impl RepositoryPlan {
    pub fn build(table: &Table, language: TargetLanguage) -> Result<Self> {
        let pk = table.primary_key();
        if pk.is_empty() {
            return Err(GenerationError::MissingPrimaryKey {
                table: table.name.clone(),
            }
            .into());
        }

        let record = table.to_interface(language)?;
        let style = match language {
            TargetLanguage::TypeScript => NamingStyle::Camel,
            TargetLanguage::Rust => NamingStyle::Snake,
        };

        let in_key = |column: &Column| pk.iter().any(|k| k.eq_ignore_ascii_case(&column.name));
        let key_columns: Vec<&Column> = pk.iter().filter_map(|k| table.column(k)).collect();
        let insertable: Vec<&Column> = table
            .columns
            .iter()
            .filter(|&c| !in_key(c) && !c.auto_increment)
            .collect();
        let updatable: Vec<&Column> = table.columns.iter().filter(|&c| !in_key(c)).collect();

        let key_parameter = |column: &Column| Parameter {
            name: argument_identifier(&column.name, language),
            column: column.name.clone(),
            ty: column.scalar_type.language_type(language).to_string(),
            optional: false,
        };
        let input_parameter = |column: &Column| Parameter {
            name: field_identifier(&column.name, language),
            column: column.name.clone(),
            ty: column.scalar_type.language_type(language).to_string(),
            optional: column.nullable,
        };
        let keys: Vec<Parameter> = key_columns.iter().map(|&c| key_parameter(c)).collect();
        let pk_names: Vec<String> = key_columns.iter().map(|c| c.name.clone()).collect();
        let generated_key = match key_columns.as_slice() {
            [column] => column.auto_increment || column.scalar_type == ScalarType::Integer,
            _ => false,
        };

        let mut operations = vec![
            Operation {
                kind: OperationKind::FindById,
                name: apply_naming_convention("find_by_id", style),
                sql: render(Statement::Select(Select {
                    table: table.name.clone(),
                    filter: pk_names.clone(),
                    order_by: Vec::new(),
                    paginate: false,
                }))?,
                inputs: Vec::new(),
                keys: keys.clone(),
            },
            Operation {
                kind: OperationKind::FindAll,
                name: apply_naming_convention("find_all", style),
                sql: render(Statement::Select(Select {
                    table: table.name.clone(),
                    filter: Vec::new(),
                    order_by: pk_names.clone(),
                    paginate: true,
                }))?,
                inputs: Vec::new(),
                keys: Vec::new(),
            },
            Operation {
                kind: OperationKind::Create,
                name: "create".to_string(),
                sql: render(Statement::Insert(Insert {
                    table: table.name.clone(),
                    columns: insertable.iter().map(|c| c.name.clone()).collect(),
                    returning: true,
                }))?,
                inputs: insertable.iter().map(|&c| input_parameter(c)).collect(),
                keys: Vec::new(),
            },
        ];

        if !updatable.is_empty() {
            operations.push(Operation {
                kind: OperationKind::Update,
                name: "update".to_string(),
                sql: render(Statement::Update(Update {
                    table: table.name.clone(),
                    set: updatable.iter().map(|c| c.name.clone()).collect(),
                    filter: pk_names.clone(),
                    returning: true,
                }))?,
                inputs: updatable.iter().map(|&c| input_parameter(c)).collect(),
                keys: keys.clone(),
            });
        }

        operations.push(Operation {
            kind: OperationKind::Delete,
            name: "delete".to_string(),
            sql: render(Statement::Delete(Delete {
                table: table.name.clone(),
                filter: pk_names.clone(),
            }))?,
            inputs: Vec::new(),
            keys: keys.clone(),
        });

        let single_key = (pk.len() == 1).then(|| pk[0].as_str());
        for column in &table.columns {
            let is_key = single_key.map_or(false, |k| k.eq_ignore_ascii_case(&column.name));
            if is_key || !table.is_unique_column(&column.name) {
                continue;
            }
            let accessor = format!("find_by_{}", naming::sanitize_identifier(&column.name.to_snake_case()));
            operations.push(Operation {
                kind: OperationKind::FindByUnique,
                name: apply_naming_convention(&accessor, style),
                sql: render(Statement::Select(Select {
                    table: table.name.clone(),
                    filter: vec![column.name.clone()],
                    order_by: Vec::new(),
                    paginate: false,
                }))?,
                inputs: Vec::new(),
                keys: vec![key_parameter(column)],
            });
        }

        let names: Vec<String> = operations.iter().map(|o| o.name.clone()).collect();
        if let Some((_, name)) = naming::check_identifier_conflicts(&names, false).into_iter().next() {
            return Err(SchemaError::NameCollision {
                scope: format!("repository operations of table '{}'", table.name),
                name,
            }
            .into());
        }

        let input = |name: String, columns: &[&Column]| TypeDeclaration {
            name,
            table: table.name.clone(),
            language,
            kind: DeclarationKind::Input,
            fields: record
                .fields
                .iter()
                .filter(|f| columns.iter().any(|c| c.name == f.column))
                .cloned()
                .collect::<Vec<FieldDeclaration>>(),
            doc: None,
        };
        let create_input = input(format!("New{}", record.name), insertable.as_slice());
        let update_input = (!updatable.is_empty())
            .then(|| input(format!("{}Update", record.name), updatable.as_slice()));

        tracing::debug!(table = %table.name, operations = operations.len(), "Planned repository");

        Ok(Self {
            table: table.name.clone(),
            language,
            module: naming::sanitize_identifier(&table.name.to_snake_case()),
            record,
            create_input,
            update_input,
            generated_key,
            operations,
        })
    }

    pub fn operation(&self, kind: OperationKind) -> Option<&Operation> {
        self.operations.iter().find(|o| o.kind == kind)
    }

    /// Type names this plan declares
    pub fn type_names(&self) -> Vec<String> {
        let mut names = vec![self.record.name.clone(), self.create_input.name.clone()];
        if let Some(update) = &self.update_input {
            names.push(update.name.clone());
        }
        names
    }
}

fn render(statement: Statement) -> Result<String> {
    let sql = printer::render(&statement)?;
    // Drivers take one statement without the terminator
    Ok(sql.trim_end_matches(';').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::table::TableConstraint;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("email", ScalarType::Text).unique())
            .with_column(Column::new("display_name", ScalarType::Text).nullable())
    }

    #[test]
    fn test_operations_for_typescript() {
        let plan = RepositoryPlan::build(&users(), TargetLanguage::TypeScript).unwrap();
        let names: Vec<&str> = plan.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["findById", "findAll", "create", "update", "delete", "findByEmail"]);

        let sql: Vec<&str> = plan.operations.iter().map(|o| o.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                "SELECT * FROM users WHERE id = ?1",
                "SELECT * FROM users ORDER BY id LIMIT ?1 OFFSET ?2",
                "INSERT INTO users (email, display_name) VALUES (?1, ?2) RETURNING *",
                "UPDATE users SET email = ?1, display_name = ?2 WHERE id = ?3 RETURNING *",
                "DELETE FROM users WHERE id = ?1",
                "SELECT * FROM users WHERE email = ?1",
            ]
        );

        let update = plan.operation(OperationKind::Update).unwrap();
        let bound: Vec<&str> = update.bindings().map(|p| p.column.as_str()).collect();
        assert_eq!(bound, vec!["email", "display_name", "id"]);
        assert_eq!(plan.type_names(), vec!["User", "NewUser", "UserUpdate"]);
    }

    #[test]
    fn test_create_never_takes_the_key() {
        for language in [TargetLanguage::TypeScript, TargetLanguage::Rust] {
            let plan = RepositoryPlan::build(&users(), language).unwrap();
            assert!(plan.generated_key);
            assert!(plan.create_input.fields.iter().all(|f| f.column != "id"));
            let update = plan.update_input.as_ref().unwrap();
            assert!(update.fields.iter().all(|f| f.column != "id"));
        }
    }

    #[test]
    fn test_rust_names_are_snake_case() {
        let plan = RepositoryPlan::build(&users(), TargetLanguage::Rust).unwrap();
        assert!(plan.operation(OperationKind::FindById).is_some());
        let names: Vec<&str> = plan.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["find_by_id", "find_all", "create", "update", "delete", "find_by_email"]);
        assert_eq!(plan.module, "users");
    }

    #[test]
    fn test_junction_table_has_no_update() {
        let table = Table::new("post_tags")
            .with_column(Column::new("post_id", ScalarType::Integer))
            .with_column(Column::new("tag_id", ScalarType::Integer))
            .with_constraint(TableConstraint::PrimaryKey {
                columns: vec!["post_id".to_string(), "tag_id".to_string()],
            });

        let plan = RepositoryPlan::build(&table, TargetLanguage::TypeScript).unwrap();
        assert!(!plan.generated_key);
        assert!(plan.update_input.is_none());
        assert!(plan.operation(OperationKind::Update).is_none());
        assert_eq!(
            plan.operation(OperationKind::Delete).unwrap().sql,
            "DELETE FROM post_tags WHERE post_id = ?1 AND tag_id = ?2"
        );
    }

    #[test]
    fn test_missing_primary_key() {
        let table = Table::new("events").with_column(Column::new("payload", ScalarType::Text));
        let err = RepositoryPlan::build(&table, TargetLanguage::Rust).unwrap_err();
        assert!(matches!(
            err,
            Error::Generation(GenerationError::MissingPrimaryKey { ref table }) if table == "events"
        ));
    }

    #[test]
    fn test_accessor_collision() {
        let table = Table::new("devices")
            .with_column(Column::new("serial", ScalarType::Text).primary_key())
            .with_column(Column::new("id", ScalarType::Integer).unique());

        let err = RepositoryPlan::build(&table, TargetLanguage::TypeScript).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::NameCollision { ref name, .. }) if name == "findById"
        ));
    }
}
