//! Hierarchical schema description types for flatbed.
//!
//! A schema is a map of top-level groups. Every group describes one repeated
//! object: a map of field names to [`FieldSpec`]s. Fields may nest further
//! repeated objects through `items`, which is what the flattener turns into
//! child tables.
//!
//! These types can be:
//! - Deserialized from a `.styx` document using facet-styx
//! - Built programmatically with the builder methods
//!
//! ## Example
//!
//! ```text
//! customer {
//!     customerId {type @string, primary-key true}
//!     name {type @string}
//! }
//! order {
//!     orderId {type @string, primary-key true}
//!     customerId {type @string, foreign-key @direct{table customer, field customerId}}
//!     lines {type @array, items {sku {type @string}, quantity {type @number}}}
//!     tags {type @array}
//! }
//! ```

use facet::Facet;
use facet_styx::RenderError;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[facet(rename_all = "lowercase")]
#[repr(u8)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    /// A repeated value. With `items` it is a repeated object, without it a
    /// repeated scalar.
    Array,
    Object,
}

impl FieldType {
    /// Returns true for types that map to a single column.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Array)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a field of the same table the declaration names.
///
/// Usage: `@direct{table customer, field customerId}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
pub struct DirectRef {
    pub table: String,
    pub field: String,
}

/// Reference to a field of a table synthesized from a nested array.
///
/// Usage: `@nested{table order, collection lines, field sku}` targets
/// `order_lines.sku`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
pub struct NestedRef {
    pub table: String,
    pub collection: String,
    pub field: String,
}

/// Where a foreign key points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
#[facet(rename_all = "lowercase")]
#[repr(u8)]
pub enum ForeignKeyPath {
    /// `table.field`
    Direct(DirectRef),
    /// `table_collection.field`
    Nested(NestedRef),
}

impl ForeignKeyPath {
    pub fn direct(table: impl Into<String>, field: impl Into<String>) -> Self {
        ForeignKeyPath::Direct(DirectRef {
            table: table.into(),
            field: field.into(),
        })
    }

    pub fn nested(
        table: impl Into<String>,
        collection: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ForeignKeyPath::Nested(NestedRef {
            table: table.into(),
            collection: collection.into(),
            field: field.into(),
        })
    }

    /// Resolve to the literal `(table, column)` the constraint references.
    pub fn resolve(&self) -> (String, &str) {
        match self {
            ForeignKeyPath::Direct(r) => (r.table.clone(), r.field.as_str()),
            ForeignKeyPath::Nested(r) => (
                child_table_name(&r.table, &r.collection),
                r.field.as_str(),
            ),
        }
    }
}

impl fmt::Display for ForeignKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignKeyPath::Direct(r) => write!(f, "{}.{}", r.table, r.field),
            ForeignKeyPath::Nested(r) => write!(f, "{}[{}].{}", r.table, r.collection, r.field),
        }
    }
}

/// Name of the table synthesized for `field` of `parent`.
pub fn child_table_name(parent: &str, field: &str) -> String {
    format!("{parent}_{field}")
}

/// A single field declaration.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct FieldSpec {
    /// Declared type.
    #[facet(rename = "type")]
    pub field_type: FieldType,

    /// Part of the table's primary key.
    pub primary_key: Option<bool>,

    /// Foreign-key reference.
    pub foreign_key: Option<ForeignKeyPath>,

    /// Inner fields of a repeated object (only meaningful for arrays).
    pub items: Option<ObjectSchema>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            primary_key: None,
            foreign_key: None,
            items: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    /// A repeated scalar.
    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    /// A repeated object.
    pub fn array_of(items: ObjectSchema) -> Self {
        Self {
            items: Some(items),
            ..Self::new(FieldType::Array)
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = Some(true);
        self
    }

    pub fn references(mut self, path: ForeignKeyPath) -> Self {
        self.foreign_key = Some(path);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.unwrap_or(false)
    }

    /// Returns the inner schema when this is an array of objects.
    pub fn repeated_object(&self) -> Option<&ObjectSchema> {
        match self.field_type {
            FieldType::Array => self.items.as_ref(),
            _ => None,
        }
    }
}

/// Field map of one object, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(transparent)]
pub struct ObjectSchema(pub IndexMap<String, FieldSpec>);

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldSpec)> for ObjectSchema {
    fn from_iter<I: IntoIterator<Item = (String, FieldSpec)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The whole schema document: group name to repeated-object schema.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(transparent)]
pub struct SchemaTree(pub IndexMap<String, ObjectSchema>);

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, name: impl Into<String>, object: ObjectSchema) -> Self {
        self.0.insert(name.into(), object);
        self
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &ObjectSchema)> {
        self.0.iter().map(|(name, object)| (name.as_str(), object))
    }

    /// Parse a schema from styx source.
    pub fn from_styx(source: &str) -> Result<Self, SchemaParseError> {
        Self::from_styx_named("<schema>", source)
    }

    /// Parse a schema from styx source, naming it `filename` in diagnostics.
    pub fn from_styx_named(filename: &str, source: &str) -> Result<Self, SchemaParseError> {
        facet_styx::from_str(source).map_err(|e| SchemaParseError::Syntax {
            filename: filename.to_string(),
            rendered: e.render(filename, source).to_string(),
        })
    }

    /// Read and parse a schema file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaParseError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| SchemaParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_styx_named(&path.display().to_string(), &source)
    }
}

impl FromIterator<(String, ObjectSchema)> for SchemaTree {
    fn from_iter<I: IntoIterator<Item = (String, ObjectSchema)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Errors from reading a schema document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaParseError {
    #[error("failed to read schema {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse schema {filename}:\n{rendered}")]
    Syntax { filename: String, rendered: String },
}

#[cfg(test)]
mod tests;
