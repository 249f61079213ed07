//! Postgres gateway over a single tokio-postgres connection.

use crate::gateway::{DatabaseGateway, GatewayError};
use crate::sql::{add_columns_sql, add_foreign_key_sql, create_table_sql};
use crate::table::{ColumnDef, ForeignKeyConstraint};
use crate::traced::TracedClient;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

const HAS_TABLE_SQL: &str = "SELECT EXISTS (
    SELECT 1 FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_name = $1
)";

const HAS_COLUMN_SQL: &str = "SELECT EXISTS (
    SELECT 1 FROM information_schema.columns
    WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2
)";

const HAS_FOREIGN_KEY_SQL: &str = "SELECT EXISTS (
    SELECT 1
    FROM pg_constraint c
    JOIN pg_class src ON src.oid = c.conrelid
    JOIN pg_namespace ns ON ns.oid = src.relnamespace
    JOIN pg_class tgt ON tgt.oid = c.confrelid
    JOIN pg_attribute src_col ON src_col.attrelid = c.conrelid AND src_col.attnum = c.conkey[1]
    JOIN pg_attribute tgt_col ON tgt_col.attrelid = c.confrelid AND tgt_col.attnum = c.confkey[1]
    WHERE c.contype = 'f'
      AND cardinality(c.conkey) = 1
      AND ns.nspname = current_schema()
      AND src.relname = $1
      AND src_col.attname = $2
      AND tgt.relname = $3
      AND tgt_col.attname = $4
)";

/// A [`DatabaseGateway`] backed by one Postgres connection.
///
/// The connection is acquired in [`connect`](Self::connect) and released in
/// [`close`](DatabaseGateway::close).
pub struct PgGateway {
    client: TracedClient,
    driver: JoinHandle<()>,
}

impl PgGateway {
    /// Connect, giving up after `timeout`.
    ///
    /// `database_url` is passed to tokio-postgres untouched, so both URLs and
    /// `key=value` connection strings work.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let connecting = tokio_postgres::connect(database_url, NoTls);
        let (client, connection) = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| {
                GatewayError::Connectivity(format!("timed out after {}s", timeout.as_secs_f32()))
            })?
            .map_err(|e| GatewayError::Connectivity(e.to_string()))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "database connection error");
            }
        });

        tracing::debug!("connected to database");
        Ok(Self {
            client: TracedClient::new(client),
            driver,
        })
    }

    async fn exists(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<bool, GatewayError> {
        let row = self.client.query_one(sql, params).await.map_err(classify)?;
        row.try_get(0).map_err(undecodable)
    }

    async fn execute(&self, sql: &str) -> Result<(), GatewayError> {
        self.client.execute(sql, &[]).await.map_err(classify)?;
        Ok(())
    }
}

impl DatabaseGateway for PgGateway {
    async fn has_table(&self, table: &str) -> Result<bool, GatewayError> {
        self.exists(HAS_TABLE_SQL, &[&table]).await
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, GatewayError> {
        self.exists(HAS_COLUMN_SQL, &[&table, &column]).await
    }

    async fn has_foreign_key(&self, fk: &ForeignKeyConstraint) -> Result<bool, GatewayError> {
        self.exists(
            HAS_FOREIGN_KEY_SQL,
            &[&fk.table, &fk.column, &fk.target_table, &fk.target_column],
        )
        .await
    }

    async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
    ) -> Result<(), GatewayError> {
        self.execute(&create_table_sql(table, columns, primary_key)).await
    }

    async fn alter_table_add_columns(
        &self,
        table: &str,
        columns: &[ColumnDef],
    ) -> Result<(), GatewayError> {
        self.execute(&add_columns_sql(table, columns)).await
    }

    async fn alter_table_add_foreign_key(
        &self,
        fk: &ForeignKeyConstraint,
    ) -> Result<(), GatewayError> {
        self.execute(&add_foreign_key_sql(fk)).await
    }

    async fn close(self) {
        // Dropping the last client handle lets the connection future finish.
        drop(self.client);
        if let Err(e) = self.driver.await {
            tracing::warn!(error = %e, "connection task did not shut down cleanly");
        }
        tracing::debug!("database connection closed");
    }
}

/// Sort driver errors into fatal and per-statement ones.
fn classify(e: tokio_postgres::Error) -> GatewayError {
    if e.is_closed() {
        return GatewayError::Connectivity(e.to_string());
    }
    match e.as_db_error() {
        // class 08 (connection exception) and 57P (operator intervention)
        Some(db) if db.code().code().starts_with("08") || db.code().code().starts_with("57P") => {
            GatewayError::Connectivity(db.message().to_string())
        }
        Some(db) => GatewayError::Rejected {
            code: db.code().code().to_string(),
            message: db.message().to_string(),
        },
        None => GatewayError::Connectivity(e.to_string()),
    }
}

/// A row came back but its value could not be read. The connection is fine.
fn undecodable(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Rejected {
        // invalid_binary_representation
        code: "22P03".to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_rows_only_affect_one_check() {
        let err = undecodable("error deserializing column 0");
        assert_eq!(
            err,
            GatewayError::Rejected {
                code: "22P03".to_string(),
                message: "error deserializing column 0".to_string(),
            }
        );
    }
}
