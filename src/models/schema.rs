//! Table and column descriptors.
//!
//! Tables are described by ordinary structs built at startup: a table name and an
//! ordered list of columns, exactly one of which is the primary key. Statement
//! templates for the common row operations are derived from the descriptor.

use crate::db::binder::placeholders;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam};
use std::collections::HashSet;

/// Default DDL type for string columns.
pub const DEFAULT_STRING_DDL: &str = "varchar(100)";

/// Alias used for the aggregate in count templates.
pub const COUNT_ALIAS: &str = "_num_";

/// Logical kind of a column, mirroring the supported field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    String,
    Boolean,
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    /// e.g., "varchar(50)", "bigint"
    pub ddl: String,
    pub primary_key: bool,
    /// Value used when a saved record omits this column.
    pub default: QueryParam,
}

impl ColumnDef {
    fn new(name: impl Into<String>, kind: ColumnKind, ddl: &str, default: QueryParam) -> Self {
        Self {
            name: name.into(),
            kind,
            ddl: ddl.to_string(),
            primary_key: false,
            default,
        }
    }

    /// `varchar(100)` column with no default.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::String, DEFAULT_STRING_DDL, QueryParam::Null)
    }

    /// `boolean` column defaulting to false.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Boolean, "boolean", QueryParam::Bool(false))
    }

    /// `bigint` column defaulting to 0.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Integer, "bigint", QueryParam::Int(0))
    }

    /// `real` column defaulting to 0.0.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Float, "real", QueryParam::Float(0.0))
    }

    /// `text` column with no default.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text, "text", QueryParam::Null)
    }

    /// Mark this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the DDL type (e.g., `varchar(50)`).
    pub fn with_ddl(mut self, ddl: impl Into<String>) -> Self {
        self.ddl = ddl.into();
        self
    }

    /// Override the default value.
    pub fn with_default(mut self, default: impl Into<QueryParam>) -> Self {
        self.default = default.into();
        self
    }
}

impl std::fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:?}, {}:{}>", self.kind, self.ddl, self.name)
    }
}

/// A validated table descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnDef>,
    primary_key: usize,
}

impl TableSchema {
    /// Start describing a table.
    pub fn builder(table: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[self.primary_key]
    }

    /// Columns other than the primary key, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    fn quoted_columns(&self, db: DatabaseType) -> String {
        self.columns
            .iter()
            .map(|c| db.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT <all columns> FROM <table>`
    pub fn select_sql(&self, db: DatabaseType) -> String {
        format!(
            "SELECT {} FROM {}",
            self.quoted_columns(db),
            db.quote_ident(&self.table)
        )
    }

    /// `INSERT INTO <table> (<all columns>) VALUES (?, ...)`
    pub fn insert_sql(&self, db: DatabaseType) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            db.quote_ident(&self.table),
            self.quoted_columns(db),
            placeholders(self.columns.len())
        )
    }

    /// `UPDATE <table> SET <field> = ?, ... WHERE <pk> = ?`
    pub fn update_sql(&self, db: DatabaseType) -> String {
        let assignments = self
            .fields()
            .map(|c| format!("{} = ?", db.quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            db.quote_ident(&self.table),
            assignments,
            db.quote_ident(&self.primary_key().name)
        )
    }

    /// `DELETE FROM <table> WHERE <pk> = ?`
    pub fn delete_sql(&self, db: DatabaseType) -> String {
        format!(
            "DELETE FROM {} WHERE {} = ?",
            db.quote_ident(&self.table),
            db.quote_ident(&self.primary_key().name)
        )
    }

    /// `SELECT COUNT(<pk>) AS _num_ FROM <table>`
    pub fn count_sql(&self, db: DatabaseType) -> String {
        format!(
            "SELECT COUNT({}) AS {} FROM {}",
            db.quote_ident(&self.primary_key().name),
            db.quote_ident(COUNT_ALIAS),
            db.quote_ident(&self.table)
        )
    }

    /// `CREATE TABLE IF NOT EXISTS` from the column DDL types.
    pub fn create_table_sql(&self, db: DatabaseType) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let not_null = if c.default.is_null() { "" } else { " NOT NULL" };
                let pk = if c.primary_key { " PRIMARY KEY" } else { "" };
                format!("{} {}{}{}", db.quote_ident(&c.name), c.ddl, not_null, pk)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            db.quote_ident(&self.table),
            columns
        )
    }
}

pub struct TableSchemaBuilder {
    table: String,
    columns: Vec<ColumnDef>,
}

impl TableSchemaBuilder {
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Validate the descriptor: a non-empty table name, unique column names and
    /// exactly one primary key.
    pub fn build(self) -> DbResult<TableSchema> {
        if self.table.trim().is_empty() {
            return Err(DbError::configuration("Table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(DbError::configuration(format!(
                "Table '{}' has no columns",
                self.table
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::configuration(format!(
                    "Duplicate column '{}' in table '{}'",
                    column.name, self.table
                )));
            }
        }

        let keys: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(idx, _)| idx)
            .collect();
        let primary_key = match keys.as_slice() {
            [idx] => *idx,
            [] => {
                return Err(DbError::configuration(format!(
                    "Primary key not found for table '{}'",
                    self.table
                )));
            }
            _ => {
                return Err(DbError::configuration(format!(
                    "Duplicate primary key for table '{}'",
                    self.table
                )));
            }
        };

        tracing::info!(
            table = %self.table,
            columns = self.columns.len(),
            primary_key = %self.columns[primary_key].name,
            "Found table schema"
        );

        Ok(TableSchema {
            table: self.table,
            columns: self.columns,
            primary_key,
        })
    }
}
