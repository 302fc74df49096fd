//! Prints the statement tree as SQLite (Cloudflare D1) SQL

use crate::error::GenerationError;
use crate::sql::ast::{
    ColumnConstraint, ColumnDef, CreateIndex, CreateTable, IndexTerm, Statement,
    TableConstraintDef,
};
use crate::utils::naming::is_plain_identifier;

type Result<T> = std::result::Result<T, GenerationError>;

/// Quote an identifier when SQLite needs it.
///
/// Plain, non-keyword identifiers are emitted bare so generated DDL stays readable.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(GenerationError::InvalidIdentifier {
            identifier: name.to_string(),
            reason: "identifier is empty".to_string(),
        });
    }
    if name.contains('\0') {
        return Err(GenerationError::InvalidIdentifier {
            identifier: name.to_string(),
            reason: "identifier contains a NUL character".to_string(),
        });
    }

    if is_plain_identifier(name) {
        Ok(name.to_string())
    } else {
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

fn quote_list(names: &[String]) -> Result<String> {
    Ok(names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

fn equality_filter(columns: &[String], first_param: usize) -> Result<String> {
    Ok(columns
        .iter()
        .enumerate()
        .map(|(i, c)| Ok(format!("{} = ?{}", quote_identifier(c)?, first_param + i)))
        .collect::<Result<Vec<_>>>()?
        .join(" AND "))
}

fn comment_lines(text: &str) -> String {
    text.lines()
        .map(|line| format!("-- {}", line).trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a single statement, `;`-terminated unless it is a comment
pub fn render(statement: &Statement) -> Result<String> {
    let sql = match statement {
        Statement::CreateTable(create) => return render_create_table(create),
        Statement::CreateIndex(create) => render_create_index(create)?,
        Statement::DropTable { name, if_exists } => format!(
            "DROP TABLE {}{}",
            if *if_exists { "IF EXISTS " } else { "" },
            quote_identifier(name)?
        ),
        Statement::RenameTable { from, to } => format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(from)?,
            quote_identifier(to)?
        ),
        Statement::AddColumn { table, column } => format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table)?,
            render_column(column)?
        ),
        Statement::DropColumn { table, column } => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table)?,
            quote_identifier(column)?
        ),
        Statement::RenameColumn { table, from, to } => format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_identifier(table)?,
            quote_identifier(from)?,
            quote_identifier(to)?
        ),
        Statement::DropIndex { name, if_exists } => format!(
            "DROP INDEX {}{}",
            if *if_exists { "IF EXISTS " } else { "" },
            quote_identifier(name)?
        ),
        Statement::CopyRows {
            from,
            into,
            columns,
        } => {
            let list = quote_list(columns)?;
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                quote_identifier(into)?,
                list,
                list,
                quote_identifier(from)?
            )
        }
        Statement::Pragma { name, value } => match value {
            Some(value) => format!("PRAGMA {} = {}", name, value),
            None => format!("PRAGMA {}", name),
        },
        Statement::Select(select) => {
            let mut sql = format!("SELECT * FROM {}", quote_identifier(&select.table)?);
            if !select.filter.is_empty() {
                sql.push_str(&format!(" WHERE {}", equality_filter(&select.filter, 1)?));
            }
            if !select.order_by.is_empty() {
                sql.push_str(&format!(" ORDER BY {}", quote_list(&select.order_by)?));
            }
            if select.paginate {
                let next = select.filter.len() + 1;
                sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", next, next + 1));
            }
            sql
        }
        Statement::Insert(insert) => {
            let mut sql = if insert.columns.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(&insert.table)?)
            } else {
                let placeholders = (1..=insert.columns.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_identifier(&insert.table)?,
                    quote_list(&insert.columns)?,
                    placeholders
                )
            };
            if insert.returning {
                sql.push_str(" RETURNING *");
            }
            sql
        }
        Statement::Update(update) => {
            let set = update
                .set
                .iter()
                .enumerate()
                .map(|(i, c)| Ok(format!("{} = ?{}", quote_identifier(c)?, i + 1)))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            let mut sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_identifier(&update.table)?,
                set,
                equality_filter(&update.filter, update.set.len() + 1)?
            );
            if update.returning {
                sql.push_str(" RETURNING *");
            }
            sql
        }
        Statement::Delete(delete) => format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(&delete.table)?,
            equality_filter(&delete.filter, 1)?
        ),
        Statement::Comment(text) => return Ok(comment_lines(text)),
    };

    Ok(format!("{};", sql))
}

/// Render statements separated by a blank line
pub fn render_all<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Result<String> {
    Ok(statements
        .into_iter()
        .map(render)
        .collect::<Result<Vec<_>>>()?
        .join("\n\n"))
}

fn render_create_table(create: &CreateTable) -> Result<String> {
    let mut lines = Vec::with_capacity(create.columns.len() + create.constraints.len());
    for column in &create.columns {
        lines.push(format!("  {}", render_column(column)?));
    }
    for constraint in &create.constraints {
        let rendered = match constraint {
            TableConstraintDef::PrimaryKey(columns) => {
                format!("PRIMARY KEY ({})", quote_list(columns)?)
            }
            TableConstraintDef::Unique(columns) => format!("UNIQUE ({})", quote_list(columns)?),
            TableConstraintDef::Check(expr) => format!("CHECK ({})", expr),
        };
        lines.push(format!("  {}", rendered));
    }

    let mut sql = String::new();
    if let Some(comment) = create.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        sql.push_str(&comment_lines(comment));
        sql.push('\n');
    }
    sql.push_str(&format!(
        "CREATE TABLE {}{} (\n{}\n);",
        if create.if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(&create.name)?,
        lines.join(",\n")
    ));

    Ok(sql)
}

fn render_column(column: &ColumnDef) -> Result<String> {
    let mut sql = format!("{} {}", quote_identifier(&column.name)?, column.type_name);

    for constraint in &column.constraints {
        match constraint {
            ColumnConstraint::PrimaryKey { autoincrement } => {
                sql.push_str(" PRIMARY KEY");
                if *autoincrement {
                    sql.push_str(" AUTOINCREMENT");
                }
            }
            ColumnConstraint::NotNull => sql.push_str(" NOT NULL"),
            ColumnConstraint::Unique => sql.push_str(" UNIQUE"),
            ColumnConstraint::Default(expr) => sql.push_str(&format!(" DEFAULT {}", expr)),
            ColumnConstraint::Check(expr) => sql.push_str(&format!(" CHECK ({})", expr)),
            ColumnConstraint::References {
                table,
                column,
                on_delete,
            } => {
                sql.push_str(&format!(
                    " REFERENCES {}({})",
                    quote_identifier(table)?,
                    quote_identifier(column)?
                ));
                if let Some(action) = on_delete {
                    sql.push_str(&format!(" ON DELETE {}", action));
                }
            }
        }
    }

    Ok(sql)
}

fn render_create_index(create: &CreateIndex) -> Result<String> {
    let terms = create
        .terms
        .iter()
        .map(|term| match term {
            IndexTerm::Column(name) => quote_identifier(name),
            IndexTerm::Expression(expr) => Ok(expr.clone()),
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut sql = format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if create.unique { "UNIQUE " } else { "" },
        quote_identifier(&create.name)?,
        quote_identifier(&create.table)?,
        terms
    );
    if let Some(condition) = &create.condition {
        sql.push_str(&format!(" WHERE {}", condition));
    }

    Ok(sql)
}
