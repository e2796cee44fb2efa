//! Executor glue.
//!
//! Statement compilation never touches the database. This trait is the seam
//! where a compiled [`BuiltQuery`] meets a connection: a plain
//! `tokio_postgres` client, a transaction, or a pooled client.

use crate::compile::BuiltQuery;
use crate::error::OrmResult;
use std::future::Future;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Runs compiled statements.
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Run a compiled query.
    fn query_built(&self, query: &BuiltQuery) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            tracing::debug!(target: "corm::exec", sql = %query.sql, args = query.args.len(), "query");
            let params = query.params_ref();
            self.query(&query.sql, &params).await
        }
    }

    /// Run a compiled statement.
    fn execute_built(&self, query: &BuiltQuery) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            tracing::debug!(target: "corm::exec", sql = %query.sql, args = query.args.len(), "execute");
            let params = query.params_ref();
            self.execute(&query.sql, &params).await
        }
    }
}

impl Executor for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        Ok(tokio_postgres::Client::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        Ok(tokio_postgres::Client::execute(self, sql, params).await?)
    }
}

impl Executor for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        Ok(tokio_postgres::Transaction::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        Ok(tokio_postgres::Transaction::execute(self, sql, params).await?)
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        Executor::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        let client: &tokio_postgres::Client = self;
        Executor::execute(client, sql, params).await
    }
}

impl<E: Executor> Executor for &E {
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (*self).query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = OrmResult<u64>> + Send {
        (*self).execute(sql, params)
    }
}
