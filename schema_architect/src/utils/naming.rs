//! Naming utilities for Schema Architect
//!
//! Every identifier the compiler derives (index names, record types, accessor
//! names, migration file names) goes through this module, so derivation stays a
//! pure function of the table and column names.

use inflector::Inflector;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PLAIN_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// Naming conventions the generators can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingStyle {
    Snake,
    Camel,
    Pascal,
}

/// Apply a naming convention to a string
pub fn apply_naming_convention(name: &str, style: NamingStyle) -> String {
    match style {
        NamingStyle::Snake => name.to_snake_case(),
        NamingStyle::Camel => name.to_camel_case(),
        NamingStyle::Pascal => name.to_pascal_case(),
    }
}

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Get index name from table and columns according to pattern
pub fn get_index_name(pattern: &str, table_name: &str, columns: &[String]) -> String {
    let columns_str = columns
        .iter()
        .map(|c| sanitize_identifier(c))
        .collect::<Vec<_>>()
        .join("_");

    format_name(pattern, &[("table", table_name), ("columns", &columns_str)])
}

/// Record type name for a table: singular, PascalCase
pub fn record_name(table_name: &str) -> String {
    singularize(&table_name.to_snake_case()).to_pascal_case()
}

/// Sanitize identifiers for use as generated source identifiers
pub fn sanitize_identifier(name: &str) -> String {
    let mut sanitized = name.replace(|c: char| !c.is_alphanumeric() && c != '_', "_");

    // Ensure identifier doesn't start with a number
    if sanitized.chars().next().map_or(false, |c| c.is_numeric()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Find every group of names that map to the same key.
///
/// Returns pairs `(first, later)` in input order.
pub fn check_identifier_conflicts(names: &[String], ignore_case: bool) -> Vec<(String, String)> {
    let mut seen = HashMap::<String, &String>::new();
    let mut conflicts = Vec::new();

    for name in names {
        let key = if ignore_case { name.to_lowercase() } else { name.clone() };

        match seen.get(&key) {
            Some(existing) => conflicts.push(((*existing).clone(), name.clone())),
            None => {
                seen.insert(key, name);
            }
        }
    }

    conflicts
}

/// Truncate an identifier to fit database limits
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length || max_length <= 9 {
        return name.to_string();
    }

    // Room for the underscore and an 8 character hash
    let mut keep_length = max_length - 9;
    while !name.is_char_boundary(keep_length) {
        keep_length -= 1;
    }

    let hash = format!("{:x}", md5::compute(name.as_bytes()));
    format!("{}_{}", &name[..keep_length], &hash[0..8])
}

/// Convert a plural name to singular
pub fn singularize(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "people" => "person".to_string(),
        "children" => "child".to_string(),
        "men" => "man".to_string(),
        "women" => "woman".to_string(),
        "feet" => "foot".to_string(),
        "teeth" => "tooth".to_string(),
        "geese" => "goose".to_string(),
        "mice" => "mouse".to_string(),
        _ => name.to_singular(),
    }
}

/// Format a free-form name as a migration file slug
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "migration".to_string()
    } else {
        slug.to_string()
    }
}

/// Whether a name can appear unquoted in SQL
pub fn is_plain_identifier(name: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(name) && !is_sql_keyword(name)
}

/// Check if a name is a reserved SQL keyword
pub fn is_sql_keyword(name: &str) -> bool {
    const SQL_KEYWORDS: &[&str] = &[
        "add", "all", "alter", "and", "as", "asc", "autoincrement", "between", "by", "case",
        "cascade", "check", "collate", "column", "commit", "constraint", "create", "cross",
        "default", "delete", "desc", "distinct", "drop", "else", "end", "escape", "except",
        "exists", "foreign", "from", "full", "group", "having", "if", "in", "index", "inner",
        "insert", "intersect", "into", "is", "join", "key", "left", "like", "limit", "natural",
        "not", "null", "offset", "on", "or", "order", "outer", "pragma", "primary", "references",
        "rename", "replace", "returning", "right", "rowid", "select", "set", "table", "then",
        "to", "transaction", "trigger", "union", "unique", "update", "using", "values", "view",
        "when", "where", "with",
    ];

    SQL_KEYWORDS.contains(&name.to_lowercase().as_str())
}

/// Check if a name is a reserved Rust keyword
pub fn is_rust_keyword(name: &str) -> bool {
    const RUST_KEYWORDS: &[&str] = &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
        "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
        "true", "type", "unsafe", "use", "where", "while",
    ];

    RUST_KEYWORDS.contains(&name)
}

/// Check if a name is reserved in TypeScript and cannot name a parameter
pub fn is_typescript_keyword(name: &str) -> bool {
    const TS_KEYWORDS: &[&str] = &[
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
        "true", "try", "typeof", "var", "void", "while", "with", "let", "static", "yield",
        "await", "implements", "interface", "package", "private", "protected", "public",
    ];

    TS_KEYWORDS.contains(&name)
}
