use crate::apply::StatementExecutor;
use crate::pg::connection::PgConnection;
use crate::sqlgen::quote_ident;
use crate::types::Dialect;
use crate::util::{Result, SyncError};
use async_trait::async_trait;
use sqlx::Executor;
use std::time::Duration;

/// Runs each statement on its own against the pool. No spanning transaction.
///
/// With a target schema set, each statement runs on a connection whose
/// `search_path` points at that schema, so unqualified DDL lands where
/// `PgCatalog` reads from.
pub struct PgExecutor<'a> {
    connection: &'a PgConnection,
    schema: Option<String>,
    statement_timeout: Option<Duration>,
}

impl<'a> PgExecutor<'a> {
    pub fn new(connection: &'a PgConnection) -> Self {
        Self {
            connection,
            schema: None,
            statement_timeout: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    async fn run(&self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        let Some(schema) = &self.schema else {
            self.connection.pool().execute(sql).await?;
            return Ok(());
        };

        let mut conn = self.connection.pool().acquire().await?;
        let set_path = format!(
            "SET search_path TO {}",
            quote_ident(schema, Dialect::Postgres)
        );
        (&mut *conn).execute(set_path.as_str()).await?;
        let result = (&mut *conn).execute(sql).await;
        // Pooled connections are shared with other callers.
        (&mut *conn).execute("RESET search_path").await?;
        result.map(|_| ())
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor<'_> {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let result = match self.statement_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run(sql))
                .await
                .map_err(|_| {
                    SyncError::DatabaseError(format!(
                        "statement timed out after {}ms",
                        timeout.as_millis()
                    ))
                })?,
            None => self.run(sql).await,
        };

        result.map_err(|e| SyncError::DatabaseError(e.to_string()))
    }
}
