//! Statement tree for the SQL this crate emits
//!
//! Nothing outside `sql::printer` turns these into text, so quoting and
//! dialect rules live in one place.

/// A column definition inside `CREATE TABLE` or `ALTER TABLE ... ADD COLUMN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: &'static str,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey { autoincrement: bool },
    NotNull,
    Unique,
    Default(String),
    Check(String),
    References {
        table: String,
        column: String,
        on_delete: Option<&'static str>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableConstraintDef {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    Check(String),
}

/// One key of an index: either a column name or a raw expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTerm {
    Column(String),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraintDef>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub terms: Vec<IndexTerm>,
    pub condition: Option<String>,
}

/// `SELECT *` filtered by equality on `filter`, optionally paginated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    pub filter: Vec<String>,
    pub order_by: Vec<String>,
    pub paginate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub returning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub table: String,
    pub set: Vec<String>,
    pub filter: Vec<String>,
    pub returning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub table: String,
    pub filter: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable { name: String, if_exists: bool },
    RenameTable { from: String, to: String },
    AddColumn { table: String, column: ColumnDef },
    DropColumn { table: String, column: String },
    RenameColumn { table: String, from: String, to: String },
    CreateIndex(CreateIndex),
    DropIndex { name: String, if_exists: bool },
    /// `INSERT INTO into (columns) SELECT columns FROM from`
    CopyRows {
        from: String,
        into: String,
        columns: Vec<String>,
    },
    /// `PRAGMA name` or `PRAGMA name = value`
    Pragma { name: String, value: Option<String> },
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Comment(String),
}
