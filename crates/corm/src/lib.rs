//! # corm
//!
//! A dialect-aware SQL statement builder with struct mapping.
//!
//! ## Features
//!
//! - **Dialects**: Postgres (`$n`), MySQL and SQLite (`?`) placeholders and quoting
//! - **Validated identifiers**: every table and column name is checked before it is quoted
//! - **Struct mapping**: `#[derive(Model)]` maps struct fields to columns
//! - **Safe defaults**: UPDATE and DELETE refuse to compile without WHERE
//! - **Batch updates**: many rows in one `CASE ... WHEN` statement
//! - **Driver glue**: compiled statements run on any [`Executor`] (tokio-postgres, deadpool)
//!
//! ## Example
//!
//! ```ignore
//! use corm::{Model, Qb, SqlBuilder};
//!
//! #[derive(Model)]
//! #[db(table = "users")]
//! struct User {
//!     #[db("id,pk,auto")]
//!     id: i64,
//!     name: String,
//!     #[db("age,omitempty")]
//!     age: i32,
//! }
//!
//! let qb = Qb::postgres();
//! let q = qb.insert("").model(&User { id: 0, name: "alice".into(), age: 0 }).build()?;
//! assert_eq!(q.sql, r#"INSERT INTO "users" ("name") VALUES ($1)"#);
//!
//! let rows = qb.select(["id", "name"]).from("users").where_eq("id", 1).query(&client).await?;
//! ```
//!
//! Statements can also be compiled directly from text with `?` markers:
//!
//! ```ignore
//! let q = Qb::postgres().raw("SELECT * FROM t WHERE a = ? AND b = '?'", corm::args![1])?;
//! assert_eq!(q.sql, "SELECT * FROM t WHERE a = $1 AND b = '?'");
//! ```

pub mod client;
pub mod compile;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod ident;
pub mod pool;
pub mod qb;
pub mod schema;
pub mod value;

pub use client::Executor;
pub use compile::{BuiltQuery, compile};
pub use config::CormConfig;
pub use dialect::Dialect;
pub use error::{OrmError, OrmResult};
pub use expr::Expr;
pub use qb::{
    BatchRow, BatchUpdate, Cell, DeleteQb, InsertQb, MutationBuilder, Order, Qb, SelectQb,
    SqlBuilder, UpdateQb,
};
pub use schema::{Model, SchemaCache, WritePolicy};
pub use value::{InArg, Value};

#[cfg(feature = "derive")]
pub use corm_derive::Model;
