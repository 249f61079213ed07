//! Flatten hierarchical schemas into Postgres tables and reconcile live
//! databases against them.
//!
//! This crate provides:
//! - A flattener that turns a [`SchemaTree`] into [`TableDescriptor`]s,
//!   synthesizing child tables for nested arrays
//! - A reconciler that brings a live database in line with those tables,
//!   strictly additively
//! - A Postgres [`DatabaseGateway`] implementation
//!
//! # Naming Convention
//!
//! Root tables take their group name (`customer`, `order`). A nested array
//! `lines` inside `order` becomes the table `order_lines`, and that table
//! carries one foreign-key column per primary-key column of `order`.
//!
//! # Reconciliation
//!
//! Reconciliation runs in two phases with a hard barrier in between:
//!
//! 1. **Structure**: create missing tables, add missing columns
//! 2. **Relationships**: add missing foreign-key constraints
//!
//! Nothing is ever dropped, renamed or retyped. No migration history is kept;
//! every run compares the desired tables against what the database reports.
//!
//! ```ignore
//! let tree = SchemaTree::load("schema/flatbed.styx")?;
//! let tables = flatbed::flatten_validated(&tree)?;
//! let gateway = PgGateway::connect(&database_url, Duration::from_secs(10)).await?;
//! let report = flatbed::reconcile_and_close(gateway, &tables, &[]).await?;
//! println!("{report}");
//! ```

mod error;
mod flatten;
pub mod gateway;
mod pg;
mod reconcile;
pub mod sql;
mod table;
mod traced;
mod validate;

pub use error::{Error, RecoverableError, SchemaError, SchemaViolation};
pub use flatten::{flatten, flatten_validated};
pub use gateway::{DatabaseGateway, GatewayError};
pub use pg::PgGateway;
pub use reconcile::{
    ReconcileReport, ReconciliationPlan, Reconciler, plan_and_close, reconcile_and_close,
};
pub use sql::Change;
pub use table::{ColumnDef, ColumnType, FieldDescriptor, ForeignKeyConstraint, TableDescriptor};
pub use traced::TracedClient;
pub use validate::{MAX_IDENTIFIER_LEN, validate};

pub use flatbed_schema::{
    FieldSpec, FieldType, ForeignKeyPath, ObjectSchema, SchemaParseError, SchemaTree,
};

/// Result type for flatbed operations.
pub type Result<T> = std::result::Result<T, Error>;
