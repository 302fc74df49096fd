//! Typed access code generation
//!
//! Every table gets a record type, input types and a repository with
//! `findById`, paginated `findAll`, `create`, `update`, `delete` and one
//! lookup per unique column.

pub mod declaration;
pub mod plan;
pub mod rust;
pub mod typescript;

use indexmap::IndexMap;

use crate::config::CodegenConfig;
use crate::error::{Result, SchemaError};
use crate::schema::catalog::TargetLanguage;
use crate::schema::graph::SchemaGraph;
use crate::utils::naming;

pub use declaration::{DeclarationKind, FieldDeclaration, TypeDeclaration};
pub use plan::{Operation, OperationKind, Parameter, RepositoryPlan};

/// Generated files keyed by path relative to the output directory
pub type Artifacts = IndexMap<String, String>;

/// Derives repository code for every table of a schema
pub struct AccessCodeGenerator<'a> {
    config: &'a CodegenConfig,
}

impl<'a> AccessCodeGenerator<'a> {
    pub fn new(config: &'a CodegenConfig) -> Self {
        Self { config }
    }

    fn language(&self) -> TargetLanguage {
        self.config.language
    }

    /// Plan every table in declaration order, failing on the first
    /// collision between tables
    pub fn plans(&self, schema: &SchemaGraph) -> Result<Vec<RepositoryPlan>> {
        schema.validate()?;

        let plans = schema
            .tables()
            .map(|table| RepositoryPlan::build(table, self.language()))
            .collect::<Result<Vec<_>>>()?;

        let type_names: Vec<String> = plans.iter().flat_map(|p| p.type_names()).collect();
        if let Some((_, name)) = naming::check_identifier_conflicts(&type_names, false)
            .into_iter()
            .next()
        {
            return Err(SchemaError::NameCollision {
                scope: "generated type names".to_string(),
                name,
            }
            .into());
        }

        // File systems may fold case
        let modules: Vec<String> = plans.iter().map(|p| p.module.clone()).collect();
        if let Some((_, name)) = naming::check_identifier_conflicts(&modules, true)
            .into_iter()
            .next()
        {
            return Err(SchemaError::NameCollision {
                scope: "repository modules".to_string(),
                name,
            }
            .into());
        }

        Ok(plans)
    }

    /// Types file plus one repository per table
    pub fn generate(&self, schema: &SchemaGraph) -> Result<Artifacts> {
        let plans = self.plans(schema)?;
        let mut artifacts = Artifacts::new();

        match self.language() {
            TargetLanguage::TypeScript => {
                artifacts.insert(
                    typescript::TYPES_FILE.to_string(),
                    typescript::render_types(&plans),
                );
                for plan in &plans {
                    artifacts.insert(
                        typescript::repository_path(plan),
                        typescript::render_repository(plan, self.config.page_size),
                    );
                }
            }
            TargetLanguage::Rust => {
                artifacts.insert(rust::MODELS_FILE.to_string(), rust::render_models(&plans));
                artifacts.insert(
                    rust::REPOSITORIES_INDEX.to_string(),
                    rust::render_repositories_index(&plans),
                );
                for plan in &plans {
                    artifacts.insert(
                        rust::repository_path(plan),
                        rust::render_repository(plan, self.config.page_size),
                    );
                }
            }
        }

        tracing::info!(
            tables = plans.len(),
            files = artifacts.len(),
            language = ?self.language(),
            "Generated access code"
        );
        Ok(artifacts)
    }

    /// Types file plus the repository of a single table
    pub fn generate_table(&self, schema: &SchemaGraph, table_name: &str) -> Result<Artifacts> {
        let table = schema.table(table_name).ok_or_else(|| SchemaError::UnknownTable {
            table: table_name.to_string(),
        })?;
        let plans = self.plans(schema)?;
        let plan = plans
            .iter()
            .find(|p| p.table == table.name)
            .ok_or_else(|| SchemaError::UnknownTable {
                table: table_name.to_string(),
            })?;

        let mut artifacts = Artifacts::new();
        match self.language() {
            TargetLanguage::TypeScript => {
                artifacts.insert(
                    typescript::TYPES_FILE.to_string(),
                    typescript::render_types(&plans),
                );
                artifacts.insert(
                    typescript::repository_path(plan),
                    typescript::render_repository(plan, self.config.page_size),
                );
            }
            TargetLanguage::Rust => {
                artifacts.insert(rust::MODELS_FILE.to_string(), rust::render_models(&plans));
                artifacts.insert(
                    rust::repository_path(plan),
                    rust::render_repository(plan, self.config.page_size),
                );
            }
        }

        tracing::info!(table = %plan.table, operations = plan.operations.len(), "Generated repository");
        Ok(artifacts)
    }
}
