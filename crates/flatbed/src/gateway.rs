//! The database capabilities the reconciler needs.
//!
//! Everything the reconciler knows about the live database comes through this
//! trait; [`PgGateway`](crate::PgGateway) is the Postgres implementation.
//! Calls are issued one at a time over a single connection.

use crate::table::{ColumnDef, ForeignKeyConstraint};
use std::future::Future;

/// Errors a gateway can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The connection is gone or could not be established. Fatal.
    #[error("connection failed: {0}")]
    Connectivity(String),

    /// The database refused the statement (constraint violation, bad
    /// reference, ...). Only the current operation is affected.
    #[error("{message} (SQLSTATE {code})")]
    Rejected { code: String, message: String },
}

/// Introspection and DDL execution against a live database.
pub trait DatabaseGateway: Send + Sync {
    /// Whether a table exists.
    fn has_table(&self, table: &str) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// Whether a column exists on a table.
    fn has_column(
        &self,
        table: &str,
        column: &str,
    ) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// Whether an equivalent single-column foreign key already exists,
    /// whatever its constraint name.
    fn has_foreign_key(
        &self,
        fk: &ForeignKeyConstraint,
    ) -> impl Future<Output = Result<bool, GatewayError>> + Send;

    /// Create a table. `primary_key` may be empty or name several columns.
    fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Add columns to an existing table.
    fn alter_table_add_columns(
        &self,
        table: &str,
        columns: &[ColumnDef],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Add a foreign-key constraint.
    fn alter_table_add_foreign_key(
        &self,
        fk: &ForeignKeyConstraint,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Release the connection.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}
