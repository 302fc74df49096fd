//! Schema description documents
//!
//! A schema is described in TOML, YAML or JSON as a list of tables plus
//! optional relationships. Documents are read into a [`SchemaGraph`], and a
//! graph can be written back as a JSON snapshot for later diffs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::NamingConfig;
use crate::error::{Error, Result};
use crate::schema::catalog::ScalarType;
use crate::schema::graph::{Relationship, SchemaGraph};
use crate::schema::table::Table;
use crate::utils::naming::{get_index_name, truncate_identifier};

/// Supported document formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(DocumentFormat::Toml),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "json" => Ok(DocumentFormat::Json),
            _ => Err(Error::Config(format!(
                "Cannot tell the format of schema file {}; use .toml, .yaml or .json",
                path.display()
            ))),
        }
    }
}

/// The on-disk shape of a schema description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl SchemaDocument {
    /// Parse a document; unknown column types are reported before any other shape error
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self> {
        let value: serde_json::Value = match format {
            DocumentFormat::Toml => toml::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
            DocumentFormat::Json => serde_json::from_str(text)?,
        };

        check_column_types(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)?;
        let text = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), ?format, "Loading schema document");
        Self::parse(&text, format)
    }

    /// Fill in index names and owning tables left out of the document
    pub fn normalize(&mut self, naming: &NamingConfig) {
        for table in &mut self.tables {
            for index in &mut table.indexes {
                if index.table.is_empty() {
                    index.table = table.name.clone();
                }
                if index.name.is_empty() {
                    let name = get_index_name(&naming.index_pattern, &table.name, &index.columns);
                    index.name = truncate_identifier(&name, naming.max_identifier_length);
                }
            }
        }
    }

    /// Build the graph, reporting every duplicate table at once
    pub fn into_graph(self) -> Result<SchemaGraph> {
        let mut graph = SchemaGraph::new();
        let mut errors = Vec::new();

        for table in self.tables {
            if let Err(e) = graph.add_table(table) {
                errors.push(e);
            }
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        for relationship in self.relationships {
            graph.add_relationship(relationship);
        }
        Ok(graph)
    }

    pub fn from_graph(graph: &SchemaGraph) -> Self {
        Self {
            tables: graph.tables().cloned().collect(),
            relationships: graph.relationships().to_vec(),
        }
    }

    /// Pretty JSON, the snapshot format
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

fn check_column_types(document: &serde_json::Value) -> Result<()> {
    let tables = document
        .get("tables")
        .and_then(|t| t.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    for table in tables {
        let columns = table
            .get("columns")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for column in columns {
            if let Some(name) = column.get("type").and_then(|t| t.as_str()) {
                name.parse::<ScalarType>()?;
            }
        }
    }
    Ok(())
}

/// Load, normalize and build the graph for a schema file
pub fn load_schema(path: impl AsRef<Path>, naming: &NamingConfig) -> Result<SchemaGraph> {
    let mut document = SchemaDocument::load(path)?;
    document.normalize(naming);
    document.into_graph()
}
