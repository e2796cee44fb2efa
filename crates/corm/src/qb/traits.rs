//! Trait definitions for statement builders.

use super::{BatchUpdate, DeleteQb, InsertQb, SelectQb, UpdateQb};
use crate::client::Executor;
use crate::compile::BuiltQuery;
use crate::error::OrmResult;
use std::future::Future;
use tokio_postgres::Row;

/// Base trait for all statement builders.
pub trait SqlBuilder: Sync {
    /// Compile to SQL text and arguments.
    fn build(&self) -> OrmResult<BuiltQuery>;

    /// Debug helper: the SQL text, or the build error rendered as text.
    fn to_sql(&self) -> String {
        match self.build() {
            Ok(q) => q.sql,
            Err(e) => format!("<{e}>"),
        }
    }

    /// Execute and return all rows.
    fn query(&self, conn: &impl Executor) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            let built = self.build()?;
            conn.query_built(&built).await
        }
    }
}

/// Builders that mutate rows.
pub trait MutationBuilder: SqlBuilder {
    /// Execute and return the affected row count.
    fn execute(&self, conn: &impl Executor) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let built = self.build()?;
            conn.execute_built(&built).await
        }
    }
}

macro_rules! impl_sql_builder {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SqlBuilder for $ty {
                fn build(&self) -> OrmResult<BuiltQuery> {
                    <$ty>::build(self)
                }
            }
        )*
    };
}

impl_sql_builder!(SelectQb, InsertQb, UpdateQb, DeleteQb, BatchUpdate);

impl MutationBuilder for InsertQb {}
impl MutationBuilder for UpdateQb {}
impl MutationBuilder for DeleteQb {}
impl MutationBuilder for BatchUpdate {}
