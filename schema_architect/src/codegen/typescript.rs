//! TypeScript output for Cloudflare D1
//!
//! Records and inputs go to one `types.ts`; each table gets a repository
//! class wrapping a `D1Database`.

use crate::codegen::declaration::{DeclarationKind, TypeDeclaration};
use crate::codegen::plan::{Operation, OperationKind, Parameter, RepositoryPlan, UNGENERATED_KEY_NOTE};
use crate::utils::naming::sanitize_identifier;

pub const TYPES_FILE: &str = "types.ts";

const HEADER: &str = "// Generated by schema_architect. Do not edit by hand.\n";

/// String literal for embedding text in generated source
fn literal(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn property_name(name: &str) -> String {
    if sanitize_identifier(name) == name {
        name.to_string()
    } else {
        literal(name)
    }
}

fn property_access(object: &str, name: &str) -> String {
    if sanitize_identifier(name) == name {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, literal(name))
    }
}

fn doc_comment(doc: &str, indent: &str) -> String {
    format!("{}/** {} */\n", indent, doc.replace("*/", "* /").trim())
}

fn field_type(ty: &str, optional: bool) -> String {
    if optional && ty != "null" {
        format!("{} | null", ty)
    } else {
        ty.to_string()
    }
}

pub fn render_declaration(declaration: &TypeDeclaration) -> String {
    let mut out = String::new();
    if let Some(doc) = &declaration.doc {
        out.push_str(&doc_comment(doc, ""));
    }
    out.push_str(&format!("export interface {} {{\n", declaration.name));
    for field in &declaration.fields {
        if let Some(doc) = field.doc.as_deref().filter(|_| declaration.kind == DeclarationKind::Record) {
            out.push_str(&doc_comment(doc, "  "));
        }
        out.push_str(&format!(
            "  {}: {};\n",
            property_name(&field.name),
            field_type(&field.ty, field.optional)
        ));
    }
    out.push_str("}\n");
    out
}

/// `types.ts`: every table's record followed by its input types
pub fn render_types(plans: &[RepositoryPlan]) -> String {
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

fn parameter_list(keys: &[Parameter]) -> Vec<String> {
    keys.iter().map(|k| format!("{}: {}", k.name, k.ty)).collect()
}

fn bind_values(operation: &Operation) -> Vec<String> {
    let mut values: Vec<String> = operation
        .inputs
        .iter()
        .map(|p| property_access("input", &p.name))
        .collect();
    values.extend(operation.keys.iter().map(|k| k.name.clone()));
    if operation.is_paginated() {
        values.push("limit".to_string());
        values.push("offset".to_string());
    }
    values
}

fn render_method(plan: &RepositoryPlan, operation: &Operation, page_size: u32) -> String {
    let record = &plan.record.name;
    let mut params = parameter_list(&operation.keys);
    match operation.kind {
        OperationKind::FindAll => {
            params.push(format!("limit = {}", page_size));
            params.push("offset = 0".to_string());
        }
        OperationKind::Create => params.push(format!("input: {}", plan.create_input.name)),
        OperationKind::Update => {
            if let Some(update) = &plan.update_input {
                params.push(format!("input: {}", update.name));
            }
        }
        _ => {}
    }

    let statement = format!(
        "this.db\n      .prepare({})\n      .bind({})",
        literal(&operation.sql),
        bind_values(operation).join(", ")
    );
    let (returns, body) = match operation.kind {
        OperationKind::FindById | OperationKind::FindByUnique | OperationKind::Update => (
            format!("{} | null", record),
            format!("    return {}\n      .first<{}>();\n", statement, record),
        ),
        OperationKind::FindAll => (
            format!("{}[]", record),
            format!(
                "    const {{ results }} = await {}\n      .all<{}>();\n    return results;\n",
                statement, record
            ),
        ),
        OperationKind::Create => (
            record.clone(),
            format!(
                "    const row = await {}\n      .first<{}>();\n    if (row === null) {{\n      throw new Error({});\n    }}\n    return row;\n",
                statement,
                record,
                literal(&format!("insert into {} returned no row", plan.table))
            ),
        ),
        OperationKind::Delete => (
            "boolean".to_string(),
            format!(
                "    const result = await {}\n      .run();\n    return result.meta.changes > 0;\n",
                statement
            ),
        ),
    };

    let note = if operation.kind == OperationKind::Create && !plan.generated_key {
        format!("  // {}\n", UNGENERATED_KEY_NOTE)
    } else {
        String::new()
    };
    format!(
        "{}  async {}({}): Promise<{}> {{\n{}  }}\n",
        note,
        operation.name,
        params.join(", "),
        returns,
        body
    )
}

/// `repositories/<table>.ts`
pub fn render_repository(plan: &RepositoryPlan, page_size: u32) -> String {
    let imports = plan.type_names().join(", ");
    let methods: Vec<String> = plan
        .operations
        .iter()
        .map(|operation| render_method(plan, operation, page_size))
        .collect();

    format!(
        "{}\nimport type {{ {} }} from \"../types\";\n\nexport class {}Repository {{\n  constructor(private readonly db: D1Database) {{}}\n\n{}}}\n",
        HEADER,
        imports,
        plan.record.name,
        methods.join("\n")
    )
}

pub fn repository_path(plan: &RepositoryPlan) -> String {
    format!("repositories/{}.ts", plan.module)
}
