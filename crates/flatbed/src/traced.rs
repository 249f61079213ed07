//! Traced database client wrapper.
//!
//! Wraps a tokio-postgres client and logs every statement via tracing.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Error, Row};
use tracing::Instrument;

/// A client that logs all statements at debug level.
///
/// # Example
///
/// ```ignore
/// let traced = TracedClient::new(client);
/// traced.execute("ALTER TABLE \"order\" ADD COLUMN \"note\" TEXT", &[]).await?;
/// ```
pub struct TracedClient {
    inner: Client,
}

impl TracedClient {
    pub fn new(client: Client) -> Self {
        Self { inner: client }
    }

    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let affected = self
            .inner
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Execute a query, returning exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = 1u64,
        );
        self.inner.query_one(sql, params).instrument(span).await
    }
}
