//! Statement builders.
//!
//! A [`Qb`] carries the dialect, the schema cache and the scratch pool, and
//! hands out builders bound to them. Builders collect clauses, validate every
//! identifier as it arrives, and defer all placeholder text to compile time.
//!
//! The first error a builder hits is recorded; later calls become no-ops and
//! `build()` returns that error.
//!
//! # Usage
//!
//! ```ignore
//! use corm::qb::Qb;
//! use corm::expr::Expr;
//!
//! let qb = Qb::postgres();
//!
//! let q = qb
//!     .select(["id", "name"])
//!     .from("users")
//!     .where_eq("status", "active")
//!     .filter(Expr::gt("\"age\"", 18))
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .build()?;
//! // SELECT "id", "name" FROM "users" WHERE ("status" = $1) AND ("age" > $2)
//! //   ORDER BY "created_at" DESC LIMIT $3
//!
//! qb.update("users")
//!     .set("status", "inactive")
//!     .where_eq("id", 7)
//!     .build()?;
//!
//! // Refuses to compile without WHERE unless allowed explicitly.
//! assert!(qb.delete("users").build().is_err());
//! ```

mod batch_update;
mod delete;
mod insert;
mod model_rows;
mod select;
mod traits;
mod update;
mod where_clause;

pub use batch_update::{BatchRow, BatchUpdate, Cell};
pub use delete::DeleteQb;
pub use insert::InsertQb;
pub use select::{Order, SelectQb};
pub use traits::{MutationBuilder, SqlBuilder};
pub use update::UpdateQb;

use crate::compile::{BuiltQuery, Compiler};
use crate::config::CormConfig;
use crate::dialect::{self, Dialect, MySql, Postgres, Sqlite};
use crate::error::{OrmError, OrmResult};
use crate::expr::Expr;
use crate::pool::ScratchPool;
use crate::schema::SchemaCache;
use crate::value::Value;
use std::sync::Arc;

/// Builder factory bound to one dialect.
///
/// Cloning is cheap; clones share the schema cache and the scratch pool.
#[derive(Clone, Debug)]
pub struct Qb {
    dialect: Arc<dyn Dialect>,
    schemas: Arc<SchemaCache>,
    scratch: Arc<ScratchPool>,
    max_sql_len: Option<usize>,
}

impl Qb {
    /// Factory for `dialect`, using the process-wide schema cache.
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::with_dialect(Arc::new(dialect))
    }

    pub fn with_dialect(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            schemas: SchemaCache::shared(),
            scratch: Arc::new(ScratchPool::default()),
            max_sql_len: None,
        }
    }

    pub fn postgres() -> Self {
        Self::new(Postgres)
    }

    pub fn mysql() -> Self {
        Self::new(MySql)
    }

    pub fn sqlite() -> Self {
        Self::new(Sqlite)
    }

    /// Factory for a driver name (`postgres`, `pgx`, `mysql`, `sqlite3`, ...).
    pub fn for_driver(driver: &str) -> OrmResult<Self> {
        dialect::from_name(driver)
            .map(Self::with_dialect)
            .ok_or_else(|| OrmError::Config(format!("unknown dialect: {driver:?}")))
    }

    /// Factory with a private schema cache and scratch pool sized by `config`.
    pub fn from_config(config: &CormConfig) -> OrmResult<Self> {
        config.validate()?;
        let qb = Self::for_driver(&config.dialect)?;
        tracing::debug!(
            target: "corm::qb",
            dialect = qb.dialect.name(),
            schema_cache_capacity = config.schema_cache_capacity,
            max_sql_len = ?config.max_sql_len,
            "configured builder factory"
        );
        Ok(qb
            .schema_cache(Arc::new(SchemaCache::new(config.schema_cache_capacity)))
            .scratch_pool(Arc::new(ScratchPool::new(
                config.pool.max_retained_bytes,
                config.pool.buffers_per_class,
            )))
            .max_sql_len(config.max_sql_len))
    }

    /// Use `cache` instead of the shared one (e.g. an isolated cache in tests).
    pub fn schema_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.schemas = cache;
        self
    }

    pub fn scratch_pool(mut self, pool: Arc<ScratchPool>) -> Self {
        self.scratch = pool;
        self
    }

    /// Reject compiled statements longer than `max` bytes.
    pub fn max_sql_len(mut self, max: Option<usize>) -> Self {
        self.max_sql_len = max;
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    /// Nested statements must come from the same dialect.
    pub(crate) fn check_same_dialect(&self, other: &Qb) -> OrmResult<()> {
        if self.dialect.name() == other.dialect.name() {
            Ok(())
        } else {
            Err(OrmError::validation(format!(
                "cannot nest a {} statement inside a {} statement",
                other.dialect.name(),
                self.dialect.name()
            )))
        }
    }

    pub(crate) fn compiler(&self) -> Compiler<'_> {
        Compiler::with_pool(self.dialect.as_ref(), &self.scratch).max_len(self.max_sql_len)
    }

    // ==================== Builders ====================

    /// SELECT the given columns; an empty list selects `*`.
    pub fn select<I, S>(&self, columns: I) -> SelectQb
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SelectQb::new(self.clone()).columns(columns)
    }

    /// INSERT into `table`. An empty table is resolved from the model, if any.
    pub fn insert(&self, table: &str) -> InsertQb {
        InsertQb::new(self.clone(), table)
    }

    pub fn update(&self, table: &str) -> UpdateQb {
        UpdateQb::new(self.clone(), table)
    }

    pub fn delete(&self, table: &str) -> DeleteQb {
        DeleteQb::new(self.clone(), table)
    }

    /// CASE-WHEN batch UPDATE of `table`, keyed on `id` unless changed.
    pub fn batch_update(&self, table: &str) -> BatchUpdate {
        BatchUpdate::new(self.clone(), table)
    }

    /// Compile a raw statement with `?` markers.
    pub fn raw<I, V>(&self, sql: impl Into<String>, args: I) -> OrmResult<BuiltQuery>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let expr = Expr::template(sql, args);
        let mut c = self.compiler();
        c.push_expr(&expr)?;
        c.finish()
    }
}

#[cfg(test)]
mod tests;
