//! Schema flattening - turn a hierarchical schema into flat tables.
//!
//! Each top-level group becomes a table. Each nested array becomes a child
//! table named `<parent>_<field>`:
//!
//! - an array of objects is flattened recursively, and the child gets one
//!   foreign-key column per primary-key column of its parent
//! - an array of scalars becomes a table with a single `value` column
//!
//! ```text
//! order {orderId pk, lines [{sku}], tags [string]}
//!
//! order_lines (sku, orderId -> order.orderId)
//! order_tags  (value)
//! order       (orderId)
//! ```
//!
//! Tables are emitted children-first: every table comes after the tables it
//! structurally contains. That is the only ordering guarantee; a table may
//! still come before a table it references by foreign key.

use crate::table::{FieldDescriptor, TableDescriptor};
use crate::{SchemaError, validate};
use flatbed_schema::{FieldType, ObjectSchema, SchemaTree, child_table_name};

/// Column name of the single field of a repeated-scalar table.
pub const SCALAR_ARRAY_COLUMN: &str = "value";

/// Flatten a schema tree into tables.
///
/// Pure: the same tree always yields the same tables in the same order.
/// Name collisions are not checked here, see [`flatten_validated`].
pub fn flatten(tree: &SchemaTree) -> Vec<TableDescriptor> {
    let mut tables = Vec::new();
    for (group, object) in tree.groups() {
        let (fields, children) = flatten_object(group, object);
        tables.extend(children);
        tables.push(TableDescriptor::new(group, fields));
    }
    tables
}

/// Flatten a schema tree and check the result for collisions and dangling
/// foreign keys.
pub fn flatten_validated(tree: &SchemaTree) -> Result<Vec<TableDescriptor>, SchemaError> {
    let tables = flatten(tree);
    validate(&tables)?;
    Ok(tables)
}

/// Flatten one object into its own fields plus every table synthesized below it.
fn flatten_object(table: &str, object: &ObjectSchema) -> (Vec<FieldDescriptor>, Vec<TableDescriptor>) {
    let mut own = Vec::new();
    let mut children = Vec::new();

    // Children carry the whole parent key, so collect it before recursing.
    let parent_key: Vec<FieldDescriptor> = object
        .fields()
        .filter(|(_, spec)| spec.field_type.is_scalar() && spec.is_primary_key())
        .map(|(name, spec)| FieldDescriptor::new(name, spec.field_type))
        .collect();

    for (name, spec) in object.fields() {
        if spec.field_type.is_scalar() {
            own.push(FieldDescriptor {
                name: name.to_string(),
                field_type: spec.field_type,
                is_primary_key: spec.is_primary_key(),
                foreign_key: spec.foreign_key.clone(),
            });
            continue;
        }

        let child_name = child_table_name(table, name);
        match spec.repeated_object() {
            Some(items) => {
                let (mut child_fields, grandchildren) = flatten_object(&child_name, items);
                child_fields.extend(parent_key.iter().map(|key| key.propagate_to_child(table)));
                children.extend(grandchildren);
                children.push(TableDescriptor::new(child_name, child_fields));
            }
            None => {
                children.push(TableDescriptor::new(
                    child_name,
                    vec![FieldDescriptor::new(SCALAR_ARRAY_COLUMN, FieldType::String)],
                ));
            }
        }
    }

    (own, children)
}
