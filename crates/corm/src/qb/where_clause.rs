//! WHERE clause shared by SELECT, UPDATE, DELETE and batch UPDATE.

use super::select::SelectQb;
use crate::compile::Compiler;
use crate::error::OrmResult;
use crate::expr::Expr;

#[derive(Clone, Debug)]
pub(crate) enum WhereItem {
    Expr(Expr),
    Subquery {
        /// Already quoted.
        column: String,
        op: &'static str,
        sub: Box<SelectQb>,
    },
}

/// Ordered WHERE items, each rendered parenthesized and joined with `AND`.
#[derive(Clone, Debug, Default)]
pub(crate) struct WhereClause {
    items: Vec<WhereItem>,
}

impl WhereClause {
    /// Add a fragment. Blank fragments are ignored unless they carry arguments.
    pub(crate) fn push_expr(&mut self, expr: Expr) -> OrmResult<()> {
        expr.check_bindable()?;
        if !expr.is_empty() {
            self.items.push(WhereItem::Expr(expr));
        }
        Ok(())
    }

    pub(crate) fn push_subquery(&mut self, column: String, op: &'static str, sub: SelectQb) {
        self.items.push(WhereItem::Subquery {
            column,
            op,
            sub: Box::new(sub),
        });
    }

    /// No effective condition.
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// ` WHERE (a) AND (b)`, or nothing.
    pub(crate) fn write(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        for (i, item) in self.items.iter().enumerate() {
            c.push_str(if i == 0 { " WHERE " } else { " AND " });
            Self::write_item(item, c)?;
        }
        Ok(())
    }

    /// ` AND (a) AND (b)`, appended to an existing condition.
    pub(crate) fn write_and(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        for item in &self.items {
            c.push_str(" AND ");
            Self::write_item(item, c)?;
        }
        Ok(())
    }

    fn write_item(item: &WhereItem, c: &mut Compiler<'_>) -> OrmResult<()> {
        c.push_str("(");
        match item {
            WhereItem::Expr(e) => c.push_expr(e)?,
            WhereItem::Subquery { column, op, sub } => {
                c.push_str(column);
                c.push_str(" ");
                c.push_str(op);
                c.push_str(" (");
                sub.write_to(c)?;
                c.push_str(")");
            }
        }
        c.push_str(")");
        Ok(())
    }
}

/// Generate the WHERE methods for a builder with `qb`, `error` and
/// `where_clause` fields.
macro_rules! impl_where_methods {
    ($ty:ty) => {
        impl $ty {
            /// Add a condition built from the expression algebra.
            pub fn filter(mut self, expr: $crate::expr::Expr) -> Self {
                if self.error.is_none() {
                    if let Err(e) = self.where_clause.push_expr(expr) {
                        self.error = Some(e);
                    }
                }
                self
            }

            /// Add a raw condition with `?` markers. Blank text is ignored;
            /// blank text with arguments is a placeholder mismatch.
            pub fn where_raw<I, V>(self, sql: impl Into<String>, args: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<$crate::value::Value>,
            {
                self.filter($crate::expr::Expr::template(sql, args))
            }

            /// `column = ?`
            pub fn where_eq(
                mut self,
                column: &str,
                value: impl Into<$crate::value::Value>,
            ) -> Self {
                match self.quote(column, $crate::ident::IdentKind::Qualified) {
                    Some(col) => self.filter($crate::expr::Expr::eq(col, value)),
                    None => self,
                }
            }

            /// `column IN (...)`; an empty list matches nothing.
            pub fn where_in<I, A>(mut self, column: &str, values: I) -> Self
            where
                I: IntoIterator<Item = A>,
                A: Into<$crate::value::InArg>,
            {
                match self.quote(column, $crate::ident::IdentKind::Qualified) {
                    Some(col) => self.filter($crate::expr::Expr::in_list(col, values)),
                    None => self,
                }
            }

            /// `column LIKE ?`
            pub fn where_like(
                mut self,
                column: &str,
                pattern: impl Into<$crate::value::Value>,
            ) -> Self {
                match self.quote(column, $crate::ident::IdentKind::Qualified) {
                    Some(col) => self.filter($crate::expr::Expr::like(col, pattern)),
                    None => self,
                }
            }

            /// `column IS NULL`
            pub fn where_null(mut self, column: &str) -> Self {
                match self.quote(column, $crate::ident::IdentKind::Qualified) {
                    Some(col) => self.filter($crate::expr::Expr::is_null(col)),
                    None => self,
                }
            }

            /// One `column = ?` per entry, in sorted column order.
            pub fn where_map<I, K, V>(mut self, conditions: I) -> Self
            where
                I: IntoIterator<Item = (K, V)>,
                K: Into<String>,
                V: Into<$crate::value::Value>,
            {
                let sorted: ::std::collections::BTreeMap<String, $crate::value::Value> = conditions
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect();
                for (column, value) in sorted {
                    match self.quote(&column, $crate::ident::IdentKind::Single) {
                        Some(col) => self = self.filter($crate::expr::Expr::eq(col, value)),
                        None => break,
                    }
                }
                self
            }

            /// `column op (subquery)`, with `op` one of
            /// `= != <> > < >= <= IN, NOT IN, LIKE, NOT LIKE`.
            pub fn where_subquery(mut self, column: &str, op: &str, sub: $crate::qb::SelectQb) -> Self {
                if self.error.is_some() {
                    return self;
                }
                let Some(col) = self.quote(column, $crate::ident::IdentKind::Qualified) else {
                    return self;
                };
                let Some(op) = $crate::ident::normalize_subquery_op(op) else {
                    self.error = Some($crate::error::OrmError::validation(format!(
                        "invalid subquery operator: {op:?}"
                    )));
                    return self;
                };
                if let Err(e) = self.qb.check_same_dialect(sub.qb()) {
                    self.error = Some(e);
                    return self;
                }
                self.where_clause.push_subquery(col, op, sub);
                self
            }

            /// `column IN (subquery)`
            pub fn where_in_subquery(self, column: &str, sub: $crate::qb::SelectQb) -> Self {
                self.where_subquery(column, "IN", sub)
            }

            /// Validate and quote `raw`, recording the first failure.
            fn quote(&mut self, raw: &str, kind: $crate::ident::IdentKind) -> Option<String> {
                if self.error.is_some() {
                    return None;
                }
                match $crate::ident::require(self.qb.dialect(), raw, kind) {
                    Ok(q) => Some(q),
                    Err(e) => {
                        self.error = Some(e);
                        None
                    }
                }
            }
        }
    };
}

pub(crate) use impl_where_methods;
