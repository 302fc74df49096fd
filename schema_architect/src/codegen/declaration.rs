//! Record type declarations derived from tables

use inflector::Inflector;

use crate::codegen::{rust, typescript};
use crate::schema::catalog::TargetLanguage;
use crate::utils::naming::{is_rust_keyword, is_typescript_keyword, sanitize_identifier};

/// Whether a declaration describes stored rows or values passed in by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Record,
    Input,
}

/// One field of a generated record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    /// Identifier in the target language
    pub name: String,
    /// Column the field is read from
    pub column: String,
    /// Language type without optionality
    pub ty: String,
    pub optional: bool,
    pub doc: Option<String>,
}

/// A record type with one field per column, in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    pub table: String,
    pub language: TargetLanguage,
    pub kind: DeclarationKind,
    pub fields: Vec<FieldDeclaration>,
    pub doc: Option<String>,
}

impl TypeDeclaration {
    pub fn render(&self) -> String {
        match self.language {
            TargetLanguage::TypeScript => typescript::render_declaration(self),
            TargetLanguage::Rust => rust::render_declaration(self),
        }
    }
}

/// Field or parameter identifier for a column name.
///
/// TypeScript keeps the column name, since D1 returns rows keyed by it; Rust
/// uses snake_case and raw identifiers for keywords.
pub fn field_identifier(column: &str, language: TargetLanguage) -> String {
    match language {
        TargetLanguage::TypeScript => column.to_string(),
        TargetLanguage::Rust => {
            let name = sanitize_identifier(&column.to_snake_case());
            if is_rust_keyword(&name) {
                format!("r#{}", name)
            } else {
                name
            }
        }
    }
}

/// Function argument identifier for a column
pub fn argument_identifier(column: &str, language: TargetLanguage) -> String {
    match language {
        TargetLanguage::TypeScript => {
            let name = sanitize_identifier(&column.to_camel_case());
            if is_typescript_keyword(&name) {
                format!("{}Value", name)
            } else {
                name
            }
        }
        TargetLanguage::Rust => field_identifier(column, language),
    }
}
