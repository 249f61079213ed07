use thiserror::Error;

/// Fatal errors: the run stops when one of these comes up.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    SchemaParse(#[from] flatbed_schema::SchemaParseError),

    #[error("database connectivity: {0}")]
    Connectivity(String),
}

/// The flattened schema is inconsistent. Raised before any DDL is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema:\n{}", render_violations(.violations))]
pub struct SchemaError {
    pub violations: Vec<SchemaViolation>,
}

fn render_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn identifier(table: &str, field: &Option<String>) -> String {
    match field {
        Some(field) => format!("field '{field}' of table '{table}'"),
        None => format!("table name '{table}'"),
    }
}

/// A single problem found while validating flattened tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("table '{table}' is produced more than once")]
    DuplicateTable { table: String },

    #[error("field '{field}' appears more than once in table '{table}'")]
    DuplicateField { table: String, field: String },

    #[error("{} is {len} bytes; Postgres identifiers are limited to 63", identifier(.table, .field))]
    IdentifierTooLong {
        table: String,
        field: Option<String>,
        len: usize,
    },

    #[error("foreign key {table}.{field} references non-existent table '{target_table}'")]
    MissingTargetTable {
        table: String,
        field: String,
        target_table: String,
    },

    #[error(
        "foreign key {table}.{field} references non-existent column '{target_table}.{target_field}'"
    )]
    MissingTargetField {
        table: String,
        field: String,
        target_table: String,
        target_field: String,
    },
}

/// Per-item failures. Logged and recorded; the run carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoverableError {
    /// The database rejected a structural change.
    #[error("{operation}: rejected by database: {message}")]
    DdlConflict { operation: String, message: String },

    /// A relation the engine cannot express as a single-column foreign key,
    /// or one excluded by configuration.
    #[error("foreign key {table}.{column} skipped: {reason}")]
    UnsupportedRelation {
        table: String,
        column: String,
        reason: String,
    },

    /// Introspection of one table or column failed.
    #[error("introspecting {target} failed: {message}")]
    Introspection { target: String, message: String },
}
