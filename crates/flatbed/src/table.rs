//! Flattened table model.

use flatbed_schema::{FieldType, ForeignKeyPath};
use std::fmt;

/// Column types flatbed emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// TEXT
    Text,
    /// TIMESTAMP
    Timestamp,
    /// DECIMAL
    Decimal,
    /// BOOLEAN
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
            ColumnType::Decimal => write!(f, "DECIMAL"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// Map a declared field type to its column type and uniqueness.
///
/// Textual columns (strings, arrays, and the `object` fallback) carry a
/// unique constraint.
pub fn column_type(field_type: FieldType) -> (ColumnType, bool) {
    match field_type {
        FieldType::String => (ColumnType::Text, true),
        FieldType::Date => (ColumnType::Timestamp, false),
        FieldType::Number => (ColumnType::Decimal, false),
        FieldType::Boolean => (ColumnType::Boolean, false),
        FieldType::Array => (ColumnType::Text, true),
        FieldType::Object => (ColumnType::Text, true),
    }
}

/// A column as handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub unique: bool,
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.column_type)?;
        if self.unique {
            write!(f, " UNIQUE")?;
        }
        Ok(())
    }
}

/// One column of a flattened table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub is_primary_key: bool,
    pub foreign_key: Option<ForeignKeyPath>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_primary_key: false,
            foreign_key: None,
        }
    }

    pub fn is_unique(&self) -> bool {
        column_type(self.field_type).1
    }

    pub fn column_type(&self) -> ColumnType {
        column_type(self.field_type).0
    }

    pub fn to_column_def(&self) -> ColumnDef {
        let (column_type, unique) = column_type(self.field_type);
        ColumnDef {
            name: self.name.clone(),
            column_type,
            unique,
        }
    }

    /// The copy of this key field a child of `parent` carries.
    pub(crate) fn propagate_to_child(&self, parent: &str) -> Self {
        Self {
            name: self.name.clone(),
            field_type: self.field_type,
            is_primary_key: false,
            foreign_key: Some(ForeignKeyPath::direct(parent, self.name.clone())),
        }
    }
}

/// A single-column foreign-key constraint, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyConstraint {
    pub table: String,
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

impl ForeignKeyConstraint {
    /// Constraint name, following the Postgres `<table>_<column>_fkey` convention.
    pub fn name(&self) -> String {
        format!("{}_{}_fkey", self.table, self.column)
    }
}

impl fmt::Display for ForeignKeyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.table, self.column, self.target_table, self.target_column
        )
    }
}

/// One flattened table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields making up the (possibly composite) primary key, in order.
    pub fn primary_key(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_primary_key).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_key()
            .into_iter()
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn column_defs(&self) -> Vec<ColumnDef> {
        self.fields.iter().map(FieldDescriptor::to_column_def).collect()
    }

    /// Resolved foreign keys declared by this table's fields.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&FieldDescriptor, ForeignKeyConstraint)> {
        self.fields.iter().filter_map(|field| {
            let path = field.foreign_key.as_ref()?;
            let (target_table, target_column) = path.resolve();
            Some((
                field,
                ForeignKeyConstraint {
                    table: self.name.clone(),
                    column: field.name.clone(),
                    target_table,
                    target_column: target_column.to_string(),
                },
            ))
        })
    }

    /// Whether a column ends up with a single-column unique or primary-key
    /// constraint once created.
    pub fn is_column_unique(&self, column: &str) -> bool {
        let pk = self.primary_key();
        let sole_key = pk.len() == 1 && pk[0].name == column;
        sole_key || self.field(column).is_some_and(FieldDescriptor::is_unique)
    }
}
