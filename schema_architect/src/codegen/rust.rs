//! Rust output for sqlx on SQLite

use crate::codegen::declaration::{DeclarationKind, TypeDeclaration};
use crate::codegen::plan::{Operation, OperationKind, RepositoryPlan, UNGENERATED_KEY_NOTE};
use crate::utils::naming::is_rust_keyword;

pub const MODELS_FILE: &str = "models.rs";
pub const REPOSITORIES_INDEX: &str = "repositories/mod.rs";

const HEADER: &str = "// Generated by schema_architect. Do not edit by hand.\n";

fn doc_lines(doc: &str, indent: &str) -> String {
    doc.lines()
        .map(|line| format!("{}/// {}\n", indent, line).replace("/// \n", "///\n"))
        .collect()
}

/// Module identifier for a file stem
fn module_ident(module: &str) -> String {
    if is_rust_keyword(module) {
        format!("r#{}", module)
    } else {
        module.to_string()
    }
}

fn field_type(ty: &str, optional: bool) -> String {
    if optional {
        format!("Option<{}>", ty)
    } else {
        ty.to_string()
    }
}

/// Borrowed form used for function arguments
fn argument_type(ty: &str) -> &str {
    match ty {
        "String" => "&str",
        "Vec<u8>" => "&[u8]",
        other => other,
    }
}

pub fn render_declaration(declaration: &TypeDeclaration) -> String {
    let mut out = String::new();
    if let Some(doc) = &declaration.doc {
        out.push_str(&doc_lines(doc, ""));
    }
    match declaration.kind {
        DeclarationKind::Record => {
            out.push_str("#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]\n")
        }
        DeclarationKind::Input => out.push_str("#[derive(Debug, Clone, PartialEq)]\n"),
    }
    out.push_str(&format!("pub struct {} {{\n", declaration.name));
    for field in &declaration.fields {
        if let Some(doc) = &field.doc {
            out.push_str(&doc_lines(doc, "    "));
        }
        let bare = field.name.trim_start_matches("r#");
        if declaration.kind == DeclarationKind::Record && bare != field.column {
            out.push_str(&format!("    #[sqlx(rename = {:?})]\n", field.column));
        }
        out.push_str(&format!(
            "    pub {}: {},\n",
            field.name,
            field_type(&field.ty, field.optional)
        ));
    }
    out.push_str("}\n");
    out
}

/// `models.rs`: every table's record followed by its input types
pub fn render_models(plans: &[RepositoryPlan]) -> String {
    let mut blocks = Vec::new();
    for plan in plans {
        blocks.push(plan.record.render());
        blocks.push(plan.create_input.render());
        if let Some(update) = &plan.update_input {
            blocks.push(update.render());
        }
    }
    format!("{}\n{}", HEADER, blocks.join("\n"))
}

fn render_function(plan: &RepositoryPlan, operation: &Operation) -> String {
    let record = &plan.record.name;

    let mut params = vec!["pool: &SqlitePool".to_string()];
    for key in &operation.keys {
        params.push(format!("{}: {}", key.name, argument_type(&key.ty)));
    }
    match operation.kind {
        OperationKind::FindAll => {
            params.push("limit: i64".to_string());
            params.push("offset: i64".to_string());
        }
        OperationKind::Create => params.push(format!("input: &{}", plan.create_input.name)),
        OperationKind::Update => {
            if let Some(update) = &plan.update_input {
                params.push(format!("input: &{}", update.name));
            }
        }
        _ => {}
    }

    let mut binds: Vec<String> = operation
        .inputs
        .iter()
        .map(|p| format!("        .bind(&input.{})\n", p.name))
        .collect();
    binds.extend(operation.keys.iter().map(|k| format!("        .bind({})\n", k.name)));
    if operation.is_paginated() {
        binds.push("        .bind(limit)\n".to_string());
        binds.push("        .bind(offset)\n".to_string());
    }
    let binds = binds.concat();

    let query = |fetch: &str| {
        format!(
            "    sqlx::query_as::<_, {}>({:?})\n{}        .{}(pool)\n        .await\n",
            record, operation.sql, binds, fetch
        )
    };
    let (returns, body) = match operation.kind {
        OperationKind::FindById | OperationKind::FindByUnique | OperationKind::Update => {
            (format!("Option<{}>", record), query("fetch_optional"))
        }
        OperationKind::FindAll => (format!("Vec<{}>", record), query("fetch_all")),
        OperationKind::Create => (record.clone(), query("fetch_one")),
        OperationKind::Delete => (
            "bool".to_string(),
            format!(
                "    let result = sqlx::query({:?})\n{}        .execute(pool)\n        .await?;\n    Ok(result.rows_affected() > 0)\n",
                operation.sql, binds
            ),
        ),
    };

    let note = if operation.kind == OperationKind::Create && !plan.generated_key {
        format!("// {}\n", UNGENERATED_KEY_NOTE)
    } else {
        String::new()
    };
    format!(
        "{}pub async fn {}({}) -> sqlx::Result<{}> {{\n{}}}\n",
        note,
        operation.name,
        params.join(", "),
        returns,
        body
    )
}

/// `repositories/<table>.rs`
pub fn render_repository(plan: &RepositoryPlan, page_size: u32) -> String {
    let imports = plan.type_names().join(", ");
    let functions: Vec<String> = plan
        .operations
        .iter()
        .map(|operation| render_function(plan, operation))
        .collect();

    format!(
        "{}\nuse sqlx::SqlitePool;\n\nuse crate::models::{{{}}};\n\n/// Page size callers pass to `find_all` when they have no preference\npub const DEFAULT_PAGE_SIZE: i64 = {};\n\n{}",
        HEADER,
        imports,
        page_size,
        functions.join("\n")
    )
}

/// `repositories/mod.rs` declaring every repository module
pub fn render_repositories_index(plans: &[RepositoryPlan]) -> String {
    let modules: String = plans
        .iter()
        .map(|plan| format!("pub mod {};\n", module_ident(&plan.module)))
        .collect();
    format!("{}\n{}", HEADER, modules)
}

pub fn repository_path(plan: &RepositoryPlan) -> String {
    format!("repositories/{}.rs", plan.module)
}
