//! SELECT builder.

use super::Qb;
use super::where_clause::{WhereClause, impl_where_methods};
use crate::compile::{BuiltQuery, Compiler};
use crate::error::{OrmError, OrmResult};
use crate::expr::Expr;
use crate::ident::IdentKind;
use crate::value::Value;
use std::str::FromStr;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl FromStr for Order {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ASC" => Ok(Order::Asc),
            "DESC" => Ok(Order::Desc),
            other => Err(OrmError::validation(format!(
                "invalid sort direction: {other:?}"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
enum Source {
    None,
    /// Quoted table, optionally followed by ` AS "alias"`.
    Table(String),
    Select { sub: Box<SelectQb>, alias: String },
}

#[derive(Clone, Debug)]
struct Join {
    kind: &'static str,
    table: String,
    on: Expr,
}

#[derive(Clone, Debug)]
struct UnionPart {
    all: bool,
    sub: Box<SelectQb>,
}

/// SELECT statement builder.
#[derive(Clone)]
pub struct SelectQb {
    qb: Qb,
    error: Option<OrmError>,
    distinct: bool,
    columns: Vec<Expr>,
    source: Source,
    joins: Vec<Join>,
    where_clause: WhereClause,
    group_by: Vec<String>,
    having: Vec<Expr>,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    unions: Vec<UnionPart>,
    for_update: bool,
}

impl std::fmt::Debug for SelectQb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectQb")
            .field("dialect", &self.qb.dialect().name())
            .field("error", &self.error)
            .field("columns", &self.columns)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl SelectQb {
    pub(crate) fn new(qb: Qb) -> Self {
        Self {
            qb,
            error: None,
            distinct: false,
            columns: Vec::new(),
            source: Source::None,
            joins: Vec::new(),
            where_clause: WhereClause::default(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            unions: Vec::new(),
            for_update: false,
        }
    }

    pub(crate) fn qb(&self) -> &Qb {
        &self.qb
    }

    /// First recorded error, if any.
    pub fn error(&self) -> Option<&OrmError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: OrmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn adopt(&mut self, sub: &SelectQb) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.qb.check_same_dialect(&sub.qb) {
            Ok(()) => true,
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    // ==================== Columns ====================

    /// Append columns (`name`, `t.name`, `*`, `t.*`).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            match self.quote(col.as_ref(), IdentKind::SelectColumn) {
                Some(q) => self.columns.push(Expr::raw(q)),
                None => break,
            }
        }
        self
    }

    /// Append an expression column, e.g. `Expr::count("*").alias("n")`.
    pub fn column_expr(mut self, expr: Expr) -> Self {
        if self.error.is_some() {
            return self;
        }
        match expr.check_bindable() {
            Ok(()) if !expr.is_empty() => self.columns.push(expr),
            Ok(()) => {}
            Err(e) => self.fail(e),
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== Source ====================

    pub fn from(mut self, table: &str) -> Self {
        if let Some(t) = self.quote(table, IdentKind::Qualified) {
            self.source = Source::Table(t);
        }
        self
    }

    /// `FROM table AS alias`
    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        if let Some(t) = self.aliased(table, alias) {
            self.source = Source::Table(t);
        }
        self
    }

    /// `FROM (sub) AS alias`
    pub fn from_select(mut self, sub: SelectQb, alias: &str) -> Self {
        if !self.adopt(&sub) {
            return self;
        }
        if let Some(alias) = self.quote(alias, IdentKind::Single) {
            self.source = Source::Select {
                sub: Box::new(sub),
                alias,
            };
        }
        self
    }

    fn aliased(&mut self, table: &str, alias: &str) -> Option<String> {
        let table = self.quote(table, IdentKind::Qualified)?;
        let alias = self.quote(alias, IdentKind::Single)?;
        Some(format!("{table} AS {alias}"))
    }

    // ==================== JOIN ====================

    fn join(mut self, kind: &'static str, table: Option<String>, on: Expr) -> Self {
        let Some(table) = table else {
            return self;
        };
        if on.is_empty() {
            self.fail(OrmError::validation(format!("{kind} requires an ON condition")));
            return self;
        }
        self.joins.push(Join { kind, table, on });
        self
    }

    pub fn inner_join(mut self, table: &str, on: Expr) -> Self {
        let t = self.quote(table, IdentKind::Qualified);
        self.join("INNER JOIN", t, on)
    }

    pub fn left_join(mut self, table: &str, on: Expr) -> Self {
        let t = self.quote(table, IdentKind::Qualified);
        self.join("LEFT JOIN", t, on)
    }

    pub fn right_join(mut self, table: &str, on: Expr) -> Self {
        let t = self.quote(table, IdentKind::Qualified);
        self.join("RIGHT JOIN", t, on)
    }

    pub fn full_join(mut self, table: &str, on: Expr) -> Self {
        let t = self.quote(table, IdentKind::Qualified);
        self.join("FULL JOIN", t, on)
    }

    pub fn inner_join_as(mut self, table: &str, alias: &str, on: Expr) -> Self {
        let t = self.aliased(table, alias);
        self.join("INNER JOIN", t, on)
    }

    pub fn left_join_as(mut self, table: &str, alias: &str, on: Expr) -> Self {
        let t = self.aliased(table, alias);
        self.join("LEFT JOIN", t, on)
    }

    pub fn right_join_as(mut self, table: &str, alias: &str, on: Expr) -> Self {
        let t = self.aliased(table, alias);
        self.join("RIGHT JOIN", t, on)
    }

    pub fn full_join_as(mut self, table: &str, alias: &str, on: Expr) -> Self {
        let t = self.aliased(table, alias);
        self.join("FULL JOIN", t, on)
    }

    // ==================== Grouping & ordering ====================

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            match self.quote(col.as_ref(), IdentKind::Qualified) {
                Some(q) => self.group_by.push(q),
                None => break,
            }
        }
        self
    }

    /// Add a HAVING condition; blank fragments without arguments are ignored.
    pub fn having(mut self, expr: Expr) -> Self {
        if self.error.is_some() {
            return self;
        }
        match expr.check_bindable() {
            Ok(()) if !expr.is_empty() => self.having.push(expr),
            Ok(()) => {}
            Err(e) => self.fail(e),
        }
        self
    }

    pub fn having_raw<I, V>(self, sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.having(Expr::template(sql, args))
    }

    /// `ORDER BY column dir`, with `dir` one of `ASC`/`DESC` (empty means `ASC`).
    pub fn order_by(mut self, column: &str, dir: &str) -> Self {
        let Some(col) = self.quote(column, IdentKind::Qualified) else {
            return self;
        };
        match dir.parse::<Order>() {
            Ok(order) => self.order_by.push(format!("{col} {}", order.as_sql())),
            Err(e) => self.fail(e),
        }
        self
    }

    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, "ASC")
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, "DESC")
    }

    // ==================== Pagination ====================

    pub fn limit(mut self, n: i64) -> Self {
        if n < 0 {
            self.fail(OrmError::validation(format!("negative LIMIT: {n}")));
        } else {
            self.limit = Some(n);
        }
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        if n < 0 {
            self.fail(OrmError::validation(format!("negative OFFSET: {n}")));
        } else {
            self.offset = Some(n);
        }
        self
    }

    pub fn limit_offset(self, limit: i64, offset: i64) -> Self {
        self.limit(limit).offset(offset)
    }

    // ==================== Set operations & locking ====================

    /// `self UNION other`.
    ///
    /// ORDER BY, LIMIT and OFFSET set on `self` apply to the whole compound
    /// and are rendered after the last member. A member with its own tail is
    /// parenthesized. To order or limit the first member alone, nest it with
    /// [`SelectQb::from_select`].
    pub fn union(mut self, other: SelectQb) -> Self {
        if self.adopt(&other) {
            self.unions.push(UnionPart {
                all: false,
                sub: Box::new(other),
            });
        }
        self
    }

    /// `self UNION ALL other`, with the same tail rules as [`SelectQb::union`].
    pub fn union_all(mut self, other: SelectQb) -> Self {
        if self.adopt(&other) {
            self.unions.push(UnionPart {
                all: true,
                sub: Box::new(other),
            });
        }
        self
    }

    /// `FOR UPDATE`. Rejected at build time when combined with UNION.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    // ==================== Build ====================

    fn has_tail(&self) -> bool {
        !self.order_by.is_empty() || self.limit.is_some() || self.offset.is_some()
    }

    fn write_core(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        c.push_str("SELECT ");
        if self.distinct {
            c.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            c.push_str("*");
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                c.push_str(", ");
            }
            c.push_expr(col)?;
        }

        match &self.source {
            Source::None => {}
            Source::Table(t) => {
                c.push_str(" FROM ");
                c.push_str(t);
            }
            Source::Select { sub, alias } => {
                c.push_str(" FROM (");
                sub.write_to(c)?;
                c.push_str(") AS ");
                c.push_str(alias);
            }
        }

        for join in &self.joins {
            c.push_str(" ");
            c.push_str(join.kind);
            c.push_str(" ");
            c.push_str(&join.table);
            c.push_str(" ON ");
            c.push_expr(&join.on)?;
        }

        self.where_clause.write(c)?;

        if !self.group_by.is_empty() {
            c.push_str(" GROUP BY ");
            c.push_str(&self.group_by.join(", "));
        }
        for (i, h) in self.having.iter().enumerate() {
            c.push_str(if i == 0 { " HAVING (" } else { " AND (" });
            c.push_expr(h)?;
            c.push_str(")");
        }
        Ok(())
    }

    fn write_tail(&self, c: &mut Compiler<'_>) {
        if !self.order_by.is_empty() {
            c.push_str(" ORDER BY ");
            c.push_str(&self.order_by.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                c.push_str(" LIMIT ");
                c.push_arg(Value::Int(limit));
                if let Some(offset) = offset {
                    c.push_str(" OFFSET ");
                    c.push_arg(Value::Int(offset));
                }
            }
            (None, Some(offset)) => {
                if let Some(unbounded) = c.dialect().unbounded_limit() {
                    c.push_str(" LIMIT ");
                    c.push_str(unbounded);
                }
                c.push_str(" OFFSET ");
                c.push_arg(Value::Int(offset));
            }
            (None, None) => {}
        }
    }

    /// Write this statement into `c`, for nesting.
    pub(crate) fn write_to(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if matches!(self.source, Source::None) && self.columns.is_empty() {
            return Err(OrmError::validation(
                "SELECT needs a column list or a FROM source",
            ));
        }
        let locks = self.for_update || self.unions.iter().any(|u| u.sub.for_update);
        if locks && !self.unions.is_empty() {
            return Err(OrmError::validation(
                "FOR UPDATE cannot be combined with UNION",
            ));
        }

        self.write_core(c)?;
        for part in &self.unions {
            c.push_str(if part.all { " UNION ALL " } else { " UNION " });
            let wrap = part.sub.has_tail() || !part.sub.unions.is_empty();
            if wrap {
                c.push_str("(");
            }
            part.sub.write_to(c)?;
            if wrap {
                c.push_str(")");
            }
        }
        self.write_tail(c);
        if self.for_update {
            c.push_str(" FOR UPDATE");
        }
        Ok(())
    }

    /// Compile to SQL text and arguments.
    pub fn build(&self) -> OrmResult<BuiltQuery> {
        let mut c = self.qb.compiler();
        self.write_to(&mut c)?;
        c.finish()
    }
}

impl_where_methods!(SelectQb);
