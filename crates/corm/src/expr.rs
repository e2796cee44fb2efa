//! Composable SQL fragments.
//!
//! An [`Expr`] is a piece of SQL text using `?` as the argument marker, plus
//! the arguments for those markers in left-to-right order. Constructors are
//! pure; dialect placeholders are produced later by the compiler.
//!
//! The empty fragment is the identity for [`Expr::and`] / [`Expr::or`] and is
//! absorbed by [`Expr::not`], so optional conditions can be composed without
//! special-casing:
//!
//! ```ignore
//! use corm::Expr;
//!
//! let e = Expr::and([
//!     Expr::eq("status", "active"),
//!     maybe_age.map(|a| Expr::gte("age", a)).unwrap_or_default(),
//! ]);
//! ```
//!
//! Column names passed to these constructors are used verbatim. Builders
//! validate and quote them before they get here.

use crate::error::{OrmError, OrmResult};
use crate::value::{InArg, Value};

/// SQL text with `?` markers and their arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Expr {
    /// Raw SQL with no arguments.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// SQL with `?` markers and matching arguments.
    ///
    /// Marker count is checked against `args` when the fragment is compiled.
    pub fn template<I, V>(sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the text is empty or whitespace.
    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Blank text with arguments can never bind them.
    pub(crate) fn check_bindable(&self) -> OrmResult<()> {
        if self.is_empty() && !self.args.is_empty() {
            return Err(OrmError::PlaceholderMismatch {
                expected: self.args.len(),
                found: 0,
            });
        }
        Ok(())
    }

    fn compare(column: impl AsRef<str>, op: &str, value: impl Into<Value>) -> Self {
        Self {
            sql: format!("{} {op} ?", column.as_ref()),
            args: vec![value.into()],
        }
    }

    pub fn eq(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, "=", value)
    }

    pub fn ne(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, "<>", value)
    }

    pub fn gt(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, ">", value)
    }

    pub fn gte(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, ">=", value)
    }

    pub fn lt(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, "<", value)
    }

    pub fn lte(column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        Self::compare(column, "<=", value)
    }

    pub fn like(column: impl AsRef<str>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, "LIKE", pattern)
    }

    pub fn not_like(column: impl AsRef<str>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, "NOT LIKE", pattern)
    }

    /// `column BETWEEN ? AND ?`
    pub fn between(column: impl AsRef<str>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            sql: format!("{} BETWEEN ? AND ?", column.as_ref()),
            args: vec![from.into(), to.into()],
        }
    }

    pub fn is_null(column: impl AsRef<str>) -> Self {
        Self::raw(format!("{} IS NULL", column.as_ref()))
    }

    pub fn is_not_null(column: impl AsRef<str>) -> Self {
        Self::raw(format!("{} IS NOT NULL", column.as_ref()))
    }

    /// `column IN (?, ?, ...)`.
    ///
    /// List arguments are flattened one level. An empty result yields `1=0`
    /// with no arguments, so `IN ()` never reaches the database.
    pub fn in_list<I, A>(column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<InArg>,
    {
        Self::membership(column.as_ref(), "IN", values, "1=0")
    }

    /// `column NOT IN (?, ?, ...)`; an empty list yields `1=1`.
    pub fn not_in<I, A>(column: impl AsRef<str>, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<InArg>,
    {
        Self::membership(column.as_ref(), "NOT IN", values, "1=1")
    }

    fn membership<I, A>(column: &str, op: &str, values: I, when_empty: &str) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<InArg>,
    {
        let mut args = Vec::new();
        for v in values {
            v.into().flatten_into(&mut args);
        }
        if args.is_empty() {
            return Self::raw(when_empty);
        }

        let mut sql = String::with_capacity(column.len() + op.len() + 4 + args.len() * 3);
        sql.push_str(column);
        sql.push(' ');
        sql.push_str(op);
        sql.push_str(" (");
        for i in 0..args.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
        }
        sql.push(')');
        Self { sql, args }
    }

    /// `NOT (e)`; the empty fragment stays empty.
    ///
    /// A blank fragment keeps its arguments so the arity mismatch is reported
    /// when it is compiled.
    pub fn not(e: Expr) -> Self {
        if e.is_empty() {
            return Self {
                sql: String::new(),
                args: e.args,
            };
        }
        Self {
            sql: format!("NOT ({})", e.sql),
            args: e.args,
        }
    }

    /// `(a) AND (b) ...`, dropping empty members.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::join(exprs, " AND ")
    }

    /// `(a) OR (b) ...`, dropping empty members.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::join(exprs, " OR ")
    }

    fn join(exprs: impl IntoIterator<Item = Expr>, sep: &str) -> Self {
        let mut out = Self::default();
        for e in exprs {
            if e.is_empty() {
                // Arguments of a blank member still count against the markers.
                out.args.extend(e.args);
                continue;
            }
            if !out.sql.is_empty() {
                out.sql.push_str(sep);
            }
            out.sql.push('(');
            out.sql.push_str(&e.sql);
            out.sql.push(')');
            out.args.extend(e.args);
        }
        out
    }

    /// `column op ANY (subquery)`
    pub fn any(column: impl AsRef<str>, op: &str, subquery: impl AsRef<str>) -> Self {
        Self::raw(format!("{} {op} ANY ({})", column.as_ref(), subquery.as_ref()))
    }

    /// `column op ALL (subquery)`
    pub fn all(column: impl AsRef<str>, op: &str, subquery: impl AsRef<str>) -> Self {
        Self::raw(format!("{} {op} ALL ({})", column.as_ref(), subquery.as_ref()))
    }

    pub fn count(column: impl AsRef<str>) -> Self {
        Self::raw(format!("COUNT({})", column.as_ref()))
    }

    pub fn sum(column: impl AsRef<str>) -> Self {
        Self::raw(format!("SUM({})", column.as_ref()))
    }

    pub fn avg(column: impl AsRef<str>) -> Self {
        Self::raw(format!("AVG({})", column.as_ref()))
    }

    pub fn max(column: impl AsRef<str>) -> Self {
        Self::raw(format!("MAX({})", column.as_ref()))
    }

    pub fn min(column: impl AsRef<str>) -> Self {
        Self::raw(format!("MIN({})", column.as_ref()))
    }

    /// `expr AS name`, keeping the expression's arguments.
    pub fn alias(self, name: impl AsRef<str>) -> Self {
        Self {
            sql: format!("{} AS {}", self.sql, name.as_ref()),
            args: self.args,
        }
    }
}
