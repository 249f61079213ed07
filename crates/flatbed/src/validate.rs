//! Consistency checks on flattened tables.

use crate::table::TableDescriptor;
use crate::{SchemaError, SchemaViolation};
use std::collections::{HashMap, HashSet};

/// Longest identifier Postgres stores (NAMEDATALEN - 1). Longer names are
/// silently truncated, so they would never be found again by introspection.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Check flattened tables before anything touches the database.
///
/// Reports every violation found, not just the first:
/// - two tables with the same name (e.g. group `order_lines` next to the
///   child table synthesized for `order.lines`)
/// - two fields with the same name in one table
/// - table or field names longer than [`MAX_IDENTIFIER_LEN`] bytes
/// - foreign keys pointing at a table or column that does not exist
pub fn validate(tables: &[TableDescriptor]) -> Result<(), SchemaError> {
    let mut violations = Vec::new();

    let mut by_name: HashMap<&str, &TableDescriptor> = HashMap::new();
    for table in tables {
        if by_name.contains_key(table.name.as_str()) {
            violations.push(SchemaViolation::DuplicateTable {
                table: table.name.clone(),
            });
        } else {
            by_name.insert(table.name.as_str(), table);
        }
        if table.name.len() > MAX_IDENTIFIER_LEN {
            violations.push(SchemaViolation::IdentifierTooLong {
                table: table.name.clone(),
                field: None,
                len: table.name.len(),
            });
        }

        let mut seen = HashSet::new();
        for field in &table.fields {
            if !seen.insert(field.name.as_str()) {
                violations.push(SchemaViolation::DuplicateField {
                    table: table.name.clone(),
                    field: field.name.clone(),
                });
            }
            if field.name.len() > MAX_IDENTIFIER_LEN {
                violations.push(SchemaViolation::IdentifierTooLong {
                    table: table.name.clone(),
                    field: Some(field.name.clone()),
                    len: field.name.len(),
                });
            }
        }
    }

    for table in tables {
        for (field, fk) in table.foreign_keys() {
            match by_name.get(fk.target_table.as_str()) {
                None => violations.push(SchemaViolation::MissingTargetTable {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    target_table: fk.target_table,
                }),
                Some(target) if target.field(&fk.target_column).is_none() => {
                    violations.push(SchemaViolation::MissingTargetField {
                        table: table.name.clone(),
                        field: field.name.clone(),
                        target_table: fk.target_table,
                        target_field: fk.target_column,
                    })
                }
                Some(_) => {}
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { violations })
    }
}
