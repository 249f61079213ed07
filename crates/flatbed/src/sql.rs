//! DDL rendering.
//!
//! Identifiers are always double-quoted: group names like `order` or `user`
//! are reserved words, and field names keep their case (`customerId`).

use crate::table::{ColumnDef, ForeignKeyConstraint};
use std::fmt;

/// A Postgres identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

fn column_sql(col: &ColumnDef, inline_primary_key: bool) -> String {
    let mut def = format!("{} {}", Ident(&col.name), col.column_type);
    if inline_primary_key {
        def.push_str(" PRIMARY KEY");
    } else if col.unique {
        def.push_str(" UNIQUE");
    }
    def
}

/// Generate a CREATE TABLE statement.
///
/// A single-column key is declared inline; a composite key becomes a table
/// constraint. Foreign keys are never included, they are added once every
/// table exists.
pub fn create_table_sql(table: &str, columns: &[ColumnDef], primary_key: &[String]) -> String {
    let inline_key = match primary_key {
        [single] => Some(single.as_str()),
        _ => None,
    };

    let mut parts: Vec<String> = columns
        .iter()
        .map(|col| format!("    {}", column_sql(col, inline_key == Some(col.name.as_str()))))
        .collect();

    if primary_key.len() > 1 {
        let quoted: Vec<_> = primary_key.iter().map(|c| Ident(c).to_string()).collect();
        parts.push(format!("    PRIMARY KEY ({})", quoted.join(", ")));
    }

    format!("CREATE TABLE {} (\n{}\n);", Ident(table), parts.join(",\n"))
}

/// Generate an ALTER TABLE statement adding `columns`.
pub fn add_columns_sql(table: &str, columns: &[ColumnDef]) -> String {
    let adds: Vec<_> = columns
        .iter()
        .map(|col| format!("ADD COLUMN {}", column_sql(col, false)))
        .collect();
    format!("ALTER TABLE {} {};", Ident(table), adds.join(", "))
}

/// Generate an ALTER TABLE statement adding a foreign-key constraint.
pub fn add_foreign_key_sql(fk: &ForeignKeyConstraint) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
        Ident(&fk.table),
        Ident(fk.name()),
        Ident(&fk.column),
        Ident(&fk.target_table),
        Ident(&fk.target_column)
    )
}

/// A single additive schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create a missing table.
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        primary_key: Vec<String>,
    },
    /// Add a missing column to an existing table.
    AddColumn { table: String, column: ColumnDef },
    /// Add a missing foreign-key constraint.
    AddForeignKey(ForeignKeyConstraint),
}

impl Change {
    /// Table this change touches.
    pub fn table(&self) -> &str {
        match self {
            Change::CreateTable { table, .. } | Change::AddColumn { table, .. } => table,
            Change::AddForeignKey(fk) => &fk.table,
        }
    }

    /// Generate the SQL statement for this change.
    pub fn to_sql(&self) -> String {
        match self {
            Change::CreateTable {
                table,
                columns,
                primary_key,
            } => create_table_sql(table, columns, primary_key),
            Change::AddColumn { table, column } => {
                add_columns_sql(table, std::slice::from_ref(column))
            }
            Change::AddForeignKey(fk) => add_foreign_key_sql(fk),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTable {
                table,
                columns,
                primary_key,
            } => {
                write!(f, "+ table {} ({} columns", table, columns.len())?;
                if !primary_key.is_empty() {
                    write!(f, ", PRIMARY KEY ({})", primary_key.join(", "))?;
                }
                write!(f, ")")
            }
            Change::AddColumn { table, column } => write!(f, "+ column {}.{}", table, column),
            Change::AddForeignKey(fk) => write!(f, "+ FOREIGN KEY {}", fk),
        }
    }
}
