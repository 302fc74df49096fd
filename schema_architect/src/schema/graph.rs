//! The set of tables plus declared relationships
//!
//! A graph is built incrementally with [`SchemaGraph::add_table`] and
//! [`SchemaGraph::add_relationship`], then checked as a whole with
//! [`SchemaGraph::validate`]. Tables keep their insertion order so every
//! rendering of the graph is deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::schema::table::{Table, TableConstraint};
use crate::sql::printer;
use crate::utils::naming::sanitize_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToMany,
    SelfReferential,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationshipKind::OneToOne => "one-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::ManyToMany => "many-to-many",
            RelationshipKind::SelfReferential => "self-referential",
        })
    }
}

/// An advisory annotation over foreign keys already present on columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    /// Junction table of a many-to-many relationship
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
}

impl Relationship {
    pub fn new(from: &str, to: &str, kind: RelationshipKind) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            through: None,
        }
    }

    pub fn through(mut self, junction: &str) -> Self {
        self.through = Some(junction.to_string());
        self
    }
}

/// Tables keyed by name, in declaration order, plus relationships
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaGraph {
    tables: IndexMap<String, Table>,
    relationships: Vec<Relationship>,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table; names are compared case-insensitively, as SQLite does
    pub fn add_table(&mut self, table: Table) -> std::result::Result<(), SchemaError> {
        if self.table(&table.name).is_some() {
            return Err(SchemaError::DuplicateTable { table: table.name });
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn with_table(mut self, table: Table) -> std::result::Result<Self, SchemaError> {
        self.add_table(table)?;
        Ok(self)
    }

    /// Record a relationship; it is checked against the foreign keys by `validate`
    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.add_relationship(relationship);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .get(name)
            .or_else(|| self.tables.values().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    /// Tables in declaration order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Check the whole graph, returning every violation found
    pub fn validate(&self) -> std::result::Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();

        let mut index_owner: HashMap<String, &str> = HashMap::new();
        for table in self.tables() {
            errors.extend(table.check());

            for index in &table.indexes {
                let key = index.name.to_lowercase();
                match index_owner.get(&key) {
                    // Repeats inside one table are reported by Table::check
                    Some(owner) if *owner != table.name => {
                        errors.push(SchemaError::DuplicateIndex {
                            index: index.name.clone(),
                        })
                    }
                    Some(_) => {}
                    None => {
                        index_owner.insert(key, &table.name);
                    }
                }
            }

            for (column, target) in table.foreign_keys() {
                let target_column = self
                    .table(&target.table)
                    .and_then(|t| t.column(&target.column).map(|c| (t, c)));
                match target_column {
                    None => errors.push(SchemaError::DanglingForeignKey {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target_table: target.table.clone(),
                        target_column: target.column.clone(),
                    }),
                    Some((target_table, _)) if !target_table.is_unique_column(&target.column) => {
                        errors.push(SchemaError::ForeignKeyTargetNotUnique {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            target_table: target.table.clone(),
                            target_column: target.column.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        for relationship in &self.relationships {
            errors.extend(self.check_relationship(relationship));
        }

        tracing::debug!(tables = self.len(), errors = errors.len(), "Validated schema graph");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether `from` has a column referencing `to`
    fn references(&self, from: &str, to: &str) -> bool {
        self.table(from).map_or(false, |t| {
            t.foreign_keys()
                .any(|(_, target)| target.table.eq_ignore_ascii_case(to))
        })
    }

    /// Whether `junction` has a two-column composite key referencing both ends
    fn is_junction(&self, junction: &Table, a: &str, b: &str) -> bool {
        let key = match junction.constraints.iter().find_map(|c| match c {
            TableConstraint::PrimaryKey { columns } => Some(columns),
            _ => None,
        }) {
            Some(columns) if columns.len() == 2 => columns,
            _ => return false,
        };

        let target_of = |name: &String| {
            junction
                .column(name)
                .and_then(|c| c.references.as_ref())
                .map(|r| r.table.to_lowercase())
        };
        let targets: Vec<Option<String>> = key.iter().map(target_of).collect();
        let (a, b) = (Some(a.to_lowercase()), Some(b.to_lowercase()));

        (targets[0] == a && targets[1] == b) || (targets[0] == b && targets[1] == a)
    }

    fn check_relationship(&self, relationship: &Relationship) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        for end in [&relationship.from, &relationship.to] {
            if self.table(end).is_none() {
                errors.push(SchemaError::UnknownTable { table: end.clone() });
            }
        }
        if let Some(through) = &relationship.through {
            if self.table(through).is_none() {
                errors.push(SchemaError::UnknownTable {
                    table: through.clone(),
                });
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        let (from, to) = (relationship.from.as_str(), relationship.to.as_str());
        let consistent = match relationship.kind {
            RelationshipKind::OneToMany => self.references(to, from),
            RelationshipKind::OneToOne => self.references(to, from) || self.references(from, to),
            RelationshipKind::SelfReferential => {
                from.eq_ignore_ascii_case(to) && self.references(from, from)
            }
            RelationshipKind::ManyToMany => {
                let found = match &relationship.through {
                    Some(through) => self
                        .table(through)
                        .map_or(false, |j| self.is_junction(j, from, to)),
                    None => self.tables().any(|j| self.is_junction(j, from, to)),
                };
                if !found {
                    errors.push(SchemaError::MissingJunctionTable {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                true
            }
        };

        if !consistent {
            errors.push(SchemaError::InconsistentRelationship {
                from: from.to_string(),
                to: to.to_string(),
                kind: relationship.kind.to_string(),
            });
        }
        errors
    }

    /// Tables ordered so every referenced table precedes the tables referencing it.
    ///
    /// Kahn's algorithm over foreign-key edges, ignoring self references, with
    /// ties broken by declaration order.
    pub fn topological_order(&self) -> std::result::Result<Vec<&Table>, SchemaError> {
        let tables: Vec<&Table> = self.tables().collect();
        let position: HashMap<String, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.to_lowercase(), i))
            .collect();

        let mut in_degree = vec![0usize; tables.len()];
        let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tables.len()];
        for (i, table) in tables.iter().enumerate() {
            let targets: BTreeSet<usize> = table
                .foreign_keys()
                .filter_map(|(_, target)| position.get(&target.table.to_lowercase()).copied())
                .filter(|&t| t != i)
                .collect();
            in_degree[i] = targets.len();
            for target in targets {
                dependents[target].insert(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut ordered = Vec::with_capacity(tables.len());
        while let Some(next) = ready.pop_first() {
            ordered.push(tables[next]);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if ordered.len() < tables.len() {
            let remaining = (0..tables.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| tables[i].name.clone())
                .collect();
            return Err(SchemaError::CyclicForeignKey { tables: remaining });
        }

        Ok(ordered)
    }

    /// Full schema DDL: each table in dependency order, followed by its indexes
    pub fn render_ddl(&self) -> Result<String> {
        let statements: Vec<_> = self
            .topological_order()?
            .into_iter()
            .flat_map(Table::statements)
            .collect();
        let mut ddl = printer::render_all(&statements)?;
        ddl.push('\n');
        Ok(ddl)
    }

    /// Mermaid `erDiagram` text for the graph; a pure view with no validation
    pub fn render_diagram(&self) -> String {
        let mut lines = vec!["erDiagram".to_string()];

        for table in self.tables() {
            let pk = table.primary_key();
            lines.push(format!("    {} {{", sanitize_identifier(&table.name)));
            for column in &table.columns {
                let mut keys = Vec::new();
                if pk.iter().any(|p| p.eq_ignore_ascii_case(&column.name)) {
                    keys.push("PK");
                }
                if column.references.is_some() {
                    keys.push("FK");
                }
                if column.unique {
                    keys.push("UK");
                }
                let mut line = format!(
                    "        {} {}",
                    column.scalar_type.sql_name(),
                    sanitize_identifier(&column.name)
                );
                if !keys.is_empty() {
                    line.push(' ');
                    line.push_str(&keys.join(", "));
                }
                lines.push(line);
            }
            lines.push("    }".to_string());
        }

        for relationship in &self.relationships {
            let cardinality = match relationship.kind {
                RelationshipKind::OneToOne => "||--||",
                RelationshipKind::OneToMany | RelationshipKind::SelfReferential => "||--o{",
                RelationshipKind::ManyToMany => "}o--o{",
            };
            lines.push(format!(
                "    {} {} {} : \"{}\"",
                sanitize_identifier(&relationship.from),
                cardinality,
                sanitize_identifier(&relationship.to),
                relationship.kind
            ));
        }

        for table in self.tables() {
            for (column, target) in table.foreign_keys() {
                if self.is_covered(&table.name, &target.table) {
                    continue;
                }
                let parent = if column.nullable { "|o" } else { "||" };
                let child = if table.is_unique_column(&column.name) { "o|" } else { "o{" };
                lines.push(format!(
                    "    {} {}--{} {} : \"{}\"",
                    sanitize_identifier(&target.table),
                    parent,
                    child,
                    sanitize_identifier(&table.name),
                    column.name
                ));
            }
        }

        let mut diagram = lines.join("\n");
        diagram.push('\n');
        diagram
    }

    /// Whether a declared relationship already accounts for `child -> parent`
    fn is_covered(&self, child: &str, parent: &str) -> bool {
        let eq = |a: &str, b: &str| a.eq_ignore_ascii_case(b);
        self.relationships.iter().any(|r| match r.kind {
            RelationshipKind::OneToMany | RelationshipKind::SelfReferential => {
                eq(&r.from, parent) && eq(&r.to, child)
            }
            RelationshipKind::OneToOne => {
                (eq(&r.from, parent) && eq(&r.to, child)) || (eq(&r.from, child) && eq(&r.to, parent))
            }
            RelationshipKind::ManyToMany => {
                let junction = match &r.through {
                    Some(through) => eq(through, child),
                    None => self
                        .table(child)
                        .map_or(false, |j| self.is_junction(j, &r.from, &r.to)),
                };
                junction && (eq(&r.from, parent) || eq(&r.to, parent))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::catalog::ScalarType;
    use crate::schema::column::{Column, OnDeleteAction};
    use crate::schema::index::Index;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("email", ScalarType::Text).unique())
    }

    fn posts() -> Table {
        Table::new("posts")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(
                Column::new("user_id", ScalarType::Integer)
                    .references("users", "id")
                    .on_delete(OnDeleteAction::Cascade),
            )
    }

    fn tags() -> Table {
        Table::new("tags")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("label", ScalarType::Text).unique())
    }

    fn post_tags() -> Table {
        Table::new("post_tags")
            .with_column(Column::new("post_id", ScalarType::Integer).references("posts", "id"))
            .with_column(Column::new("tag_id", ScalarType::Integer).references("tags", "id"))
            .with_constraint(TableConstraint::PrimaryKey {
                columns: vec!["post_id".to_string(), "tag_id".to_string()],
            })
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut graph = SchemaGraph::new();
        graph.add_table(users()).unwrap();
        assert_eq!(
            graph.add_table(Table::new("Users")),
            Err(SchemaError::DuplicateTable {
                table: "Users".to_string()
            })
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_valid_graph() {
        let graph = SchemaGraph::new()
            .with_table(users())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_relationship(Relationship::new("users", "posts", RelationshipKind::OneToMany));
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_every_error() {
        let orphan = Table::new("comments")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("post_id", ScalarType::Integer).references("posts", "id"))
            .with_column(Column::new("author", ScalarType::Text).references("users", "email"))
            .with_column(Column::new("editor", ScalarType::Integer).references("users", "nope"));
        let mut notes = Table::new("notes")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("user_id", ScalarType::Integer).references("users", "id"));
        notes.indexes.push(Index::new("idx_shared", "notes", &["user_id"]));
        let mut users = users();
        users.indexes.push(Index::new("idx_shared", "users", &["email"]));

        let graph = SchemaGraph::new()
            .with_table(users)
            .unwrap()
            .with_table(notes)
            .unwrap()
            .with_table(orphan)
            .unwrap();

        let errors = graph.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                SchemaError::DuplicateIndex {
                    index: "idx_shared".to_string()
                },
                SchemaError::DanglingForeignKey {
                    table: "comments".to_string(),
                    column: "post_id".to_string(),
                    target_table: "posts".to_string(),
                    target_column: "id".to_string(),
                },
                SchemaError::DanglingForeignKey {
                    table: "comments".to_string(),
                    column: "editor".to_string(),
                    target_table: "users".to_string(),
                    target_column: "nope".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_foreign_key_must_target_unique_column() {
        let table = Table::new("invites")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("post_user", ScalarType::Integer).references("posts", "user_id"));
        let graph = SchemaGraph::new()
            .with_table(users())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_table(table)
            .unwrap();

        let errors = graph.validate().unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [SchemaError::ForeignKeyTargetNotUnique { column, .. }] if column == "post_user"
        ));
    }

    #[test]
    fn test_many_to_many_requires_junction() {
        let base = SchemaGraph::new()
            .with_table(users())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_table(tags())
            .unwrap();

        let missing = base
            .clone()
            .with_relationship(Relationship::new("posts", "tags", RelationshipKind::ManyToMany));
        assert_eq!(
            missing.validate(),
            Err(vec![SchemaError::MissingJunctionTable {
                from: "posts".to_string(),
                to: "tags".to_string()
            }])
        );

        let found = base
            .with_table(post_tags())
            .unwrap()
            .with_relationship(Relationship::new("posts", "tags", RelationshipKind::ManyToMany));
        assert_eq!(found.validate(), Ok(()));
    }

    #[test]
    fn test_relationship_consistency() {
        let graph = SchemaGraph::new()
            .with_table(users())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_relationship(Relationship::new("posts", "users", RelationshipKind::OneToMany))
            .with_relationship(Relationship::new("users", "ghosts", RelationshipKind::OneToOne))
            .with_relationship(Relationship::new("users", "users", RelationshipKind::SelfReferential));

        let errors = graph.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], SchemaError::InconsistentRelationship { .. }));
        assert!(matches!(errors[1], SchemaError::UnknownTable { ref table } if table == "ghosts"));
        assert!(matches!(errors[2], SchemaError::InconsistentRelationship { .. }));
    }

    #[test]
    fn test_topological_order_moves_targets_first() {
        let graph = SchemaGraph::new()
            .with_table(post_tags())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_table(tags())
            .unwrap()
            .with_table(users())
            .unwrap();

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, vec!["tags", "users", "posts", "post_tags"]);
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let categories = Table::new("categories")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(
                Column::new("parent_id", ScalarType::Integer)
                    .nullable()
                    .references("categories", "id")
                    .on_delete(OnDeleteAction::SetNull),
            );
        let graph = SchemaGraph::new()
            .with_table(categories)
            .unwrap()
            .with_relationship(Relationship::new(
                "categories",
                "categories",
                RelationshipKind::SelfReferential,
            ));

        assert_eq!(graph.validate(), Ok(()));
        assert_eq!(graph.topological_order().unwrap().len(), 1);
    }

    #[test]
    fn test_mutual_foreign_keys_are_a_cycle() {
        let a = Table::new("a")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("b_id", ScalarType::Integer).nullable().references("b", "id"));
        let b = Table::new("b")
            .with_column(Column::new("id", ScalarType::Integer).auto_increment())
            .with_column(Column::new("a_id", ScalarType::Integer).nullable().references("a", "id"));
        let graph = SchemaGraph::new().with_table(a).unwrap().with_table(b).unwrap();

        assert_eq!(graph.validate(), Ok(()));
        assert_eq!(
            graph.topological_order().unwrap_err(),
            SchemaError::CyclicForeignKey {
                tables: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert!(matches!(
            graph.render_ddl(),
            Err(Error::Schema(SchemaError::CyclicForeignKey { .. }))
        ));
    }

    #[test]
    fn test_render_ddl_orders_and_terminates() {
        let graph = SchemaGraph::new()
            .with_table(posts())
            .unwrap()
            .with_table(users())
            .unwrap();
        let ddl = graph.render_ddl().unwrap();

        let users_at = ddl.find("CREATE TABLE users").unwrap();
        let posts_at = ddl.find("CREATE TABLE posts").unwrap();
        assert!(users_at < posts_at);
        assert!(ddl.contains(");\n\nCREATE TABLE posts"));
        assert_eq!(ddl, graph.render_ddl().unwrap());
    }

    #[test]
    fn test_render_diagram() {
        let graph = SchemaGraph::new()
            .with_table(users())
            .unwrap()
            .with_table(posts())
            .unwrap()
            .with_table(tags())
            .unwrap()
            .with_table(post_tags())
            .unwrap()
            .with_relationship(Relationship::new("users", "posts", RelationshipKind::OneToMany));

        let diagram = graph.render_diagram();
        assert!(diagram.starts_with("erDiagram\n    users {\n        INTEGER id PK\n        TEXT email UK\n    }"));
        assert!(diagram.contains("    users ||--o{ posts : \"one-to-many\""));
        assert!(diagram.contains("    posts ||--o{ post_tags : \"post_id\""));
        assert!(diagram.contains("    tags ||--o{ post_tags : \"tag_id\""));
        assert!(!diagram.contains(": \"user_id\""));
        assert_eq!(diagram, graph.render_diagram());
    }
}
