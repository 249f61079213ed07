//! In-memory gateway that records every call.
//!
//! Models just enough of Postgres for reconciliation: duplicate tables and
//! columns are rejected, and a foreign key needs both tables, both columns,
//! and a single-column unique or primary-key target.

#![allow(dead_code)]

use flatbed::{ColumnDef, DatabaseGateway, ForeignKeyConstraint, GatewayError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// A gateway call, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    HasTable(String),
    HasColumn(String, String),
    HasForeignKey(ForeignKeyConstraint),
    CreateTable(String),
    AddColumns(String, Vec<String>),
    AddForeignKey(ForeignKeyConstraint),
    Close,
}

impl Call {
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Call::CreateTable(_) | Call::AddColumns(..) | Call::AddForeignKey(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct MemTable {
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

impl MemTable {
    fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn is_unique(&self, column: &str) -> bool {
        let sole_key = self.primary_key.len() == 1 && self.primary_key[0] == column;
        sole_key || self.column(column).is_some_and(|c| c.unique)
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemTable>,
    foreign_keys: Vec<ForeignKeyConstraint>,
    calls: Vec<Call>,
    rejected_columns: HashSet<(String, String)>,
    unreadable: HashSet<String>,
    disconnect_on: Option<String>,
    disconnected: bool,
    closed: bool,
}

/// Cloneable handle; clones share state, so a test can keep one while the
/// reconciler consumes another.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

fn rejected(code: &str, message: impl Into<String>) -> GatewayError {
    GatewayError::Rejected {
        code: code.to_string(),
        message: message.into(),
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Seed a table as if it already existed.
    pub fn with_table(self, name: &str, columns: Vec<ColumnDef>, primary_key: &[&str]) -> Self {
        self.state().tables.insert(
            name.to_string(),
            MemTable {
                columns,
                primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            },
        );
        self
    }

    /// Reject any DDL that would create `table.column`, like a unique
    /// constraint failing on existing rows.
    pub fn reject_column(self, table: &str, column: &str) -> Self {
        self.state()
            .rejected_columns
            .insert((table.to_string(), column.to_string()));
        self
    }

    /// Fail every existence check on `table` without dropping the
    /// connection, like a row that cannot be decoded.
    pub fn unreadable(self, table: &str) -> Self {
        self.state().unreadable.insert(table.to_string());
        self
    }

    /// Drop the connection on the first DDL touching `table`.
    pub fn disconnect_on(self, table: &str) -> Self {
        self.state().disconnect_on = Some(table.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn ddl(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_ddl).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn table(&self, name: &str) -> Option<MemTable> {
        self.state().tables.get(name).cloned()
    }

    pub fn foreign_keys(&self) -> Vec<ForeignKeyConstraint> {
        self.state().foreign_keys.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn record(&self, call: Call) -> Result<MutexGuard<'_, State>, GatewayError> {
        let mut state = self.state();
        let touches = match &call {
            Call::CreateTable(t) | Call::AddColumns(t, _) => Some(t.clone()),
            Call::AddForeignKey(fk) => Some(fk.table.clone()),
            _ => None,
        };
        state.calls.push(call);
        if touches.is_some() && touches == state.disconnect_on {
            state.disconnected = true;
        }
        if state.disconnected {
            return Err(GatewayError::Connectivity("connection reset by peer".into()));
        }
        Ok(state)
    }
}

impl DatabaseGateway for MemoryGateway {
    async fn has_table(&self, table: &str) -> Result<bool, GatewayError> {
        let state = self.record(Call::HasTable(table.to_string()))?;
        if state.unreadable.contains(table) {
            return Err(rejected("22P03", "error deserializing column 0"));
        }
        Ok(state.tables.contains_key(table))
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, GatewayError> {
        let state = self.record(Call::HasColumn(table.to_string(), column.to_string()))?;
        Ok(state
            .tables
            .get(table)
            .is_some_and(|t| t.column(column).is_some()))
    }

    async fn has_foreign_key(&self, fk: &ForeignKeyConstraint) -> Result<bool, GatewayError> {
        let state = self.record(Call::HasForeignKey(fk.clone()))?;
        Ok(state.foreign_keys.contains(fk))
    }

    async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
    ) -> Result<(), GatewayError> {
        let mut state = self.record(Call::CreateTable(table.to_string()))?;
        if state.tables.contains_key(table) {
            return Err(rejected("42P07", format!("relation \"{table}\" already exists")));
        }
        if let Some(col) = columns
            .iter()
            .find(|c| state.rejected_columns.contains(&(table.to_string(), c.name.clone())))
        {
            return Err(rejected("23505", format!("could not create \"{}\"", col.name)));
        }
        state.tables.insert(
            table.to_string(),
            MemTable {
                columns: columns.to_vec(),
                primary_key: primary_key.to_vec(),
            },
        );
        Ok(())
    }

    async fn alter_table_add_columns(
        &self,
        table: &str,
        columns: &[ColumnDef],
    ) -> Result<(), GatewayError> {
        let names = columns.iter().map(|c| c.name.clone()).collect();
        let mut state = self.record(Call::AddColumns(table.to_string(), names))?;
        for col in columns {
            if state.rejected_columns.contains(&(table.to_string(), col.name.clone())) {
                return Err(rejected(
                    "23505",
                    format!("could not create unique index on \"{}\"", col.name),
                ));
            }
        }
        let Some(existing) = state.tables.get_mut(table) else {
            return Err(rejected("42P01", format!("relation \"{table}\" does not exist")));
        };
        for col in columns {
            if existing.column(&col.name).is_some() {
                return Err(rejected("42701", format!("column \"{}\" already exists", col.name)));
            }
        }
        existing.columns.extend(columns.iter().cloned());
        Ok(())
    }

    async fn alter_table_add_foreign_key(
        &self,
        fk: &ForeignKeyConstraint,
    ) -> Result<(), GatewayError> {
        let mut state = self.record(Call::AddForeignKey(fk.clone()))?;
        let source = state.tables.get(&fk.table);
        let target = state.tables.get(&fk.target_table);
        let (Some(source), Some(target)) = (source, target) else {
            return Err(rejected("42P01", "relation does not exist"));
        };
        if source.column(&fk.column).is_none() || target.column(&fk.target_column).is_none() {
            return Err(rejected("42703", "column does not exist"));
        }
        if !target.is_unique(&fk.target_column) {
            return Err(rejected(
                "42830",
                "there is no unique constraint matching given keys for referenced table",
            ));
        }
        if state.foreign_keys.contains(fk) {
            return Err(rejected("42710", format!("constraint \"{}\" already exists", fk.name())));
        }
        state.foreign_keys.push(fk.clone());
        Ok(())
    }

    async fn close(self) {
        let mut state = self.state();
        state.calls.push(Call::Close);
        state.closed = true;
    }
}
