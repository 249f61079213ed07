//! Reconciliation - bring a live database in line with flattened tables.
//!
//! Runs in two phases with a hard barrier between them:
//!
//! 1. **Structure**: every missing table is created and every missing column
//!    added. Existing columns are never altered or dropped.
//! 2. **Relationships**: every missing foreign key is added. Nothing in this
//!    phase starts before every structural change has been attempted, so all
//!    referenced tables exist by then.
//!
//! Each run recomputes what to do from introspection alone; there is no
//! migration history. A second run against an up-to-date database issues no
//! DDL at all.
//!
//! Failures are handled per item. A rejected statement or unsupported
//! relation is logged, recorded in the [`ReconcileReport`], and the run moves
//! on. Only schema errors and lost connectivity stop it.

use crate::gateway::{DatabaseGateway, GatewayError};
use crate::sql::Change;
use crate::table::{ColumnDef, FieldDescriptor, ForeignKeyConstraint, TableDescriptor};
use crate::{Error, RecoverableError, validate};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Changes a run would make, without making them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Phase 1: tables and columns.
    pub structure: Vec<Change>,
    /// Phase 2: foreign keys.
    pub relationships: Vec<Change>,
    /// Items that will not be attempted.
    pub skipped: Vec<RecoverableError>,
}

impl ReconciliationPlan {
    /// All changes in execution order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.structure.iter().chain(self.relationships.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.structure.is_empty() && self.relationships.is_empty()
    }

    /// SQL script for every planned change.
    pub fn to_sql(&self) -> String {
        self.changes()
            .map(Change::to_sql)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Changes applied, in the order they were issued.
    pub applied: Vec<Change>,
    /// Items that were skipped or failed.
    pub failures: Vec<RecoverableError>,
}

impl ReconcileReport {
    pub fn created_tables(&self) -> impl Iterator<Item = &str> {
        self.applied.iter().filter_map(|c| match c {
            Change::CreateTable { table, .. } => Some(table.as_str()),
            _ => None,
        })
    }

    pub fn added_columns(&self) -> impl Iterator<Item = (&str, &ColumnDef)> {
        self.applied.iter().filter_map(|c| match c {
            Change::AddColumn { table, column } => Some((table.as_str(), column)),
            _ => None,
        })
    }

    pub fn added_constraints(&self) -> impl Iterator<Item = &ForeignKeyConstraint> {
        self.applied.iter().filter_map(|c| match c {
            Change::AddForeignKey(fk) => Some(fk),
            _ => None,
        })
    }

    /// Number of DDL statements that succeeded.
    pub fn operation_count(&self) -> usize {
        self.applied.len()
    }

    /// Returns true if nothing had to change.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} tables created, {} columns added, {} foreign keys added, {} skipped",
            self.created_tables().count(),
            self.added_columns().count(),
            self.added_constraints().count(),
            self.failures.len()
        )?;
        for change in &self.applied {
            writeln!(f, "  {}", change)?;
        }
        for failure in &self.failures {
            writeln!(f, "  ! {}", failure)?;
        }
        Ok(())
    }
}

/// Reconciles tables against a database through a [`DatabaseGateway`].
pub struct Reconciler<G> {
    gateway: G,
    skip_constraints: HashSet<String>,
}

impl<G: DatabaseGateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            skip_constraints: HashSet::new(),
        }
    }

    /// Never attempt foreign keys declared by these tables.
    pub fn skip_constraints_for<I>(mut self, tables: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.skip_constraints
            .extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Compute the changes a run would make. Issues no DDL.
    pub async fn plan(&self, tables: &[TableDescriptor]) -> Result<ReconciliationPlan, Error> {
        validate(tables)?;
        let mut skipped = Vec::new();
        let structure = self.plan_structure(tables, &mut skipped).await?;
        let relationships = self.plan_relationships(tables, &mut skipped).await?;
        Ok(ReconciliationPlan {
            structure,
            relationships,
            skipped,
        })
    }

    /// Apply every missing table, column and foreign key.
    pub async fn reconcile(&self, tables: &[TableDescriptor]) -> Result<ReconcileReport, Error> {
        validate(tables)?;
        let mut report = ReconcileReport::default();

        tracing::info!(tables = tables.len(), "reconciling structure");
        let structure = self.plan_structure(tables, &mut report.failures).await?;
        for change in structure {
            self.apply(change, &mut report).await?;
        }

        // Barrier: relationships are only planned once structure is done.
        tracing::info!("reconciling relationships");
        let relationships = self.plan_relationships(tables, &mut report.failures).await?;
        for change in relationships {
            self.apply(change, &mut report).await?;
        }

        tracing::info!(
            applied = report.applied.len(),
            skipped = report.failures.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn plan_structure(
        &self,
        tables: &[TableDescriptor],
        failures: &mut Vec<RecoverableError>,
    ) -> Result<Vec<Change>, Error> {
        let mut changes = Vec::new();

        for table in tables {
            let exists = self.gateway.has_table(&table.name).await;
            let Some(exists) = introspected(exists, || table.name.clone(), failures)? else {
                continue;
            };

            if !exists {
                changes.push(Change::CreateTable {
                    table: table.name.clone(),
                    columns: table.column_defs(),
                    primary_key: table.primary_key_columns(),
                });
                continue;
            }

            for field in &table.fields {
                let present = self.gateway.has_column(&table.name, &field.name).await;
                let target = || format!("{}.{}", table.name, field.name);
                let Some(present) = introspected(present, target, failures)? else {
                    continue;
                };
                if !present {
                    changes.push(Change::AddColumn {
                        table: table.name.clone(),
                        column: field.to_column_def(),
                    });
                }
            }
        }

        Ok(changes)
    }

    async fn plan_relationships(
        &self,
        tables: &[TableDescriptor],
        failures: &mut Vec<RecoverableError>,
    ) -> Result<Vec<Change>, Error> {
        let by_name: HashMap<&str, &TableDescriptor> =
            tables.iter().map(|t| (t.name.as_str(), t)).collect();
        let mut changes = Vec::new();

        for table in tables {
            for (field, fk) in table.foreign_keys() {
                let support = if self.skip_constraints.contains(&table.name) {
                    Err("excluded by configuration".to_string())
                } else {
                    relation_support(&by_name, field, &fk)
                };
                if let Err(reason) = support {
                    let failure = RecoverableError::UnsupportedRelation {
                        table: fk.table.clone(),
                        column: fk.column.clone(),
                        reason,
                    };
                    tracing::warn!("{failure}");
                    failures.push(failure);
                    continue;
                }

                let exists = self.gateway.has_foreign_key(&fk).await;
                let Some(exists) = introspected(exists, || fk.to_string(), failures)? else {
                    continue;
                };
                if !exists {
                    changes.push(Change::AddForeignKey(fk));
                }
            }
        }

        Ok(changes)
    }

    async fn apply(&self, change: Change, report: &mut ReconcileReport) -> Result<(), Error> {
        let result = match &change {
            Change::CreateTable {
                table,
                columns,
                primary_key,
            } => self.gateway.create_table(table, columns, primary_key).await,
            Change::AddColumn { table, column } => {
                self.gateway
                    .alter_table_add_columns(table, std::slice::from_ref(column))
                    .await
            }
            Change::AddForeignKey(fk) => self.gateway.alter_table_add_foreign_key(fk).await,
        };

        match result {
            Ok(()) => {
                match &change {
                    Change::CreateTable { table, .. } => {
                        tracing::info!(table = %table, "created table")
                    }
                    Change::AddColumn { table, column } => {
                        tracing::info!(table = %table, column = %column.name, "added column")
                    }
                    Change::AddForeignKey(fk) => {
                        tracing::info!(constraint = %fk, "added foreign key")
                    }
                }
                report.applied.push(change);
                Ok(())
            }
            Err(GatewayError::Connectivity(message)) => Err(Error::Connectivity(message)),
            Err(e @ GatewayError::Rejected { .. }) => {
                let failure = RecoverableError::DdlConflict {
                    operation: change.to_string(),
                    message: e.to_string(),
                };
                tracing::warn!("{failure}");
                report.failures.push(failure);
                Ok(())
            }
        }
    }
}

/// Unwrap an introspection result: connectivity loss is fatal, anything else
/// is recorded and the item skipped.
fn introspected<T>(
    result: Result<T, GatewayError>,
    target: impl FnOnce() -> String,
    failures: &mut Vec<RecoverableError>,
) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GatewayError::Connectivity(message)) => Err(Error::Connectivity(message)),
        Err(e @ GatewayError::Rejected { .. }) => {
            let failure = RecoverableError::Introspection {
                target: target(),
                message: e.to_string(),
            };
            tracing::warn!("{failure}");
            failures.push(failure);
            Ok(None)
        }
    }
}

/// Whether a foreign key can be expressed as a single-column constraint.
///
/// Postgres needs the referenced column to carry its own unique or
/// primary-key constraint, and both columns to share a type.
fn relation_support(
    tables: &HashMap<&str, &TableDescriptor>,
    field: &FieldDescriptor,
    fk: &ForeignKeyConstraint,
) -> Result<(), String> {
    let target = tables
        .get(fk.target_table.as_str())
        .ok_or_else(|| format!("table '{}' is not part of the schema", fk.target_table))?;
    let target_field = target.field(&fk.target_column).ok_or_else(|| {
        format!(
            "column '{}.{}' is not part of the schema",
            fk.target_table, fk.target_column
        )
    })?;

    if field.column_type() != target_field.column_type() {
        return Err(format!(
            "column type {} does not match {} of {}.{}",
            field.column_type(),
            target_field.column_type(),
            fk.target_table,
            fk.target_column
        ));
    }

    if !target.is_column_unique(&fk.target_column) {
        return Err(if target_field.is_primary_key {
            format!(
                "{}.{} is one column of a composite primary key; referencing it needs a multi-column foreign key",
                fk.target_table, fk.target_column
            )
        } else {
            format!(
                "{}.{} has no unique or primary-key constraint",
                fk.target_table, fk.target_column
            )
        });
    }

    Ok(())
}

/// Reconcile over `gateway`, then close it whatever the outcome.
pub async fn reconcile_and_close<G: DatabaseGateway>(
    gateway: G,
    tables: &[TableDescriptor],
    skip_constraints_for: &[String],
) -> Result<ReconcileReport, Error> {
    let reconciler = Reconciler::new(gateway).skip_constraints_for(skip_constraints_for.iter().cloned());
    let result = reconciler.reconcile(tables).await;
    reconciler.into_gateway().close().await;
    result
}

/// Plan over `gateway`, then close it whatever the outcome.
pub async fn plan_and_close<G: DatabaseGateway>(
    gateway: G,
    tables: &[TableDescriptor],
    skip_constraints_for: &[String],
) -> Result<ReconciliationPlan, Error> {
    let reconciler = Reconciler::new(gateway).skip_constraints_for(skip_constraints_for.iter().cloned());
    let result = reconciler.plan(tables).await;
    reconciler.into_gateway().close().await;
    result
}
