//! Scalar types and their mapping to SQLite storage and target languages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;

/// Canonical column types, following SQLite storage classes plus NUMERIC affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScalarType {
    Integer,
    Real,
    Text,
    Blob,
    Null,
    Numeric,
}

/// Languages access code can be generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    TypeScript,
    Rust,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        ScalarType::Integer,
        ScalarType::Real,
        ScalarType::Text,
        ScalarType::Blob,
        ScalarType::Null,
        ScalarType::Numeric,
    ];

    /// Type name written into DDL
    pub fn sql_name(self) -> &'static str {
        match self {
            ScalarType::Integer => "INTEGER",
            ScalarType::Real => "REAL",
            ScalarType::Text => "TEXT",
            ScalarType::Blob => "BLOB",
            ScalarType::Null => "NULL",
            ScalarType::Numeric => "NUMERIC",
        }
    }

    /// Type name in the given target language, without optionality
    pub fn language_type(self, language: TargetLanguage) -> &'static str {
        match language {
            TargetLanguage::TypeScript => match self {
                ScalarType::Integer | ScalarType::Real | ScalarType::Numeric => "number",
                ScalarType::Text => "string",
                ScalarType::Blob => "Uint8Array",
                ScalarType::Null => "null",
            },
            TargetLanguage::Rust => match self {
                ScalarType::Integer => "i64",
                ScalarType::Real | ScalarType::Numeric => "f64",
                ScalarType::Text => "String",
                ScalarType::Blob => "Vec<u8>",
                ScalarType::Null => "()",
            },
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for ScalarType {
    type Err = GenerationError;

    /// Parse a declared type name using SQLite's affinity rules
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        // Parameterised types such as VARCHAR(255) keep only their base name
        let base = upper.split('(').next().unwrap_or_default().trim();

        let scalar = match base {
            "NULL" => ScalarType::Null,
            "" => return Err(GenerationError::UnmappedScalarType(s.to_string())),
            t if t.contains("INT") => ScalarType::Integer,
            t if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") => ScalarType::Text,
            "BLOB" => ScalarType::Blob,
            t if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") => ScalarType::Real,
            "NUMERIC" | "DECIMAL" | "BOOLEAN" | "BOOL" | "DATE" | "DATETIME" | "TIMESTAMP" => {
                ScalarType::Numeric
            }
            _ => return Err(GenerationError::UnmappedScalarType(s.to_string())),
        };

        Ok(scalar)
    }
}

impl TryFrom<String> for ScalarType {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScalarType> for String {
    fn from(value: ScalarType) -> Self {
        value.sql_name().to_string()
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetLanguage::TypeScript => f.write_str("typescript"),
            TargetLanguage::Rust => f.write_str("rust"),
        }
    }
}
