//! UPDATE builder.

use super::Qb;
use super::model_rows::ModelRows;
use super::where_clause::{WhereClause, impl_where_methods};
use crate::compile::{BuiltQuery, Compiler};
use crate::error::{OrmError, OrmResult};
use crate::expr::Expr;
use crate::ident::IdentKind;
use crate::schema::{Model, WritePolicy};
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum SetItem {
    /// Quoted column and its right-hand side.
    Assign(String, Expr),
    /// Resolved against the write policy at build time.
    Model(ModelRows),
}

/// UPDATE statement builder.
///
/// Compiling without a WHERE condition fails with
/// [`OrmError::MissingWhere`] unless [`UpdateQb::allow_empty_where`] was called.
#[derive(Clone, Debug)]
pub struct UpdateQb {
    qb: Qb,
    error: Option<OrmError>,
    table: Option<String>,
    sets: Vec<SetItem>,
    policy: WritePolicy,
    where_clause: WhereClause,
    limit: Option<i64>,
    returning: Vec<String>,
    allow_empty_where: bool,
}

impl UpdateQb {
    pub(crate) fn new(qb: Qb, table: &str) -> Self {
        let mut this = Self {
            qb,
            error: None,
            table: None,
            sets: Vec::new(),
            policy: WritePolicy::default(),
            where_clause: WhereClause::default(),
            limit: None,
            returning: Vec::new(),
            allow_empty_where: false,
        };
        if !table.trim().is_empty() {
            this.table = this.quote(table, IdentKind::Qualified);
        }
        this
    }

    fn fail(&mut self, err: OrmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    // ==================== SET ====================

    /// `column = ?`
    pub fn set(self, column: &str, value: impl Into<Value>) -> Self {
        self.set_expr(column, Expr::template("?", [value.into()]))
    }

    /// `column = <expr>`
    pub fn set_expr(mut self, column: &str, expr: Expr) -> Self {
        if expr.is_empty() {
            self.fail(OrmError::validation(format!(
                "empty expression for column {column:?}"
            )));
            return self;
        }
        if let Some(col) = self.quote(column, IdentKind::Single) {
            self.sets.push(SetItem::Assign(col, expr));
        }
        self
    }

    /// One assignment per entry, in sorted column order.
    pub fn set_map<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let sorted: BTreeMap<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for (column, value) in sorted {
            self = self.set(&column, value);
        }
        self
    }

    /// Assign the model's writable fields. Zero values of `omitempty` fields
    /// are skipped unless `include_zero(true)`.
    pub fn set_model<T: Model>(mut self, model: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match ModelRows::capture(self.qb.schemas(), std::slice::from_ref(model)) {
            Ok(rows) => self.sets.push(SetItem::Model(rows)),
            Err(e) => self.fail(e),
        }
        self
    }

    /// `column = column + ?`
    pub fn increment(mut self, column: &str, by: impl Into<Value>) -> Self {
        let Some(col) = self.quote(column, IdentKind::Single) else {
            return self;
        };
        let expr = Expr::template(format!("{col} + ?"), [by.into()]);
        self.sets.push(SetItem::Assign(col, expr));
        self
    }

    /// `column = column - ?`
    pub fn decrement(mut self, column: &str, by: impl Into<Value>) -> Self {
        let Some(col) = self.quote(column, IdentKind::Single) else {
            return self;
        };
        let expr = Expr::template(format!("{col} - ?"), [by.into()]);
        self.sets.push(SetItem::Assign(col, expr));
        self
    }

    // ==================== Model write policy ====================

    pub fn include_primary_key(mut self, yes: bool) -> Self {
        self.policy.include_primary_key = yes;
        self
    }

    pub fn include_auto(mut self, yes: bool) -> Self {
        self.policy.include_auto = yes;
        self
    }

    pub fn include_readonly(mut self, yes: bool) -> Self {
        self.policy.include_readonly = yes;
        self
    }

    pub fn include_zero(mut self, yes: bool) -> Self {
        self.policy.include_zero = yes;
        self
    }

    // ==================== Tail ====================

    /// `LIMIT n`, for dialects that accept it on UPDATE.
    pub fn limit(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        let dialect = self.qb.dialect();
        if !dialect.supports_update_limit() {
            let name = dialect.name();
            self.fail(OrmError::unsupported(name, "UPDATE ... LIMIT"));
        } else if n < 0 {
            self.fail(OrmError::validation(format!("negative LIMIT: {n}")));
        } else {
            self.limit = Some(n);
        }
        self
    }

    /// `RETURNING cols`; dropped for dialects without RETURNING.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            match self.quote(col.as_ref(), IdentKind::SelectColumn) {
                Some(q) => self.returning.push(q),
                None => break,
            }
        }
        self
    }

    /// Permit compiling without a WHERE condition (updates every row).
    pub fn allow_empty_where(mut self) -> Self {
        self.allow_empty_where = true;
        self
    }

    // ==================== Build ====================

    fn write_sets(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        let mut written = 0;
        for item in &self.sets {
            match item {
                SetItem::Assign(col, expr) => {
                    c.push_str(if written == 0 { " SET " } else { ", " });
                    c.push_str(col);
                    c.push_str(" = ");
                    c.push_expr(expr)?;
                    written += 1;
                }
                SetItem::Model(rows) => {
                    for (_, f, v) in rows.writes(0, &self.policy)? {
                        let col =
                            crate::ident::require(c.dialect(), &f.column, IdentKind::Single)?;
                        c.push_str(if written == 0 { " SET " } else { ", " });
                        c.push_str(&col);
                        c.push_str(" = ");
                        c.push_arg(v);
                        written += 1;
                    }
                }
            }
        }
        if written == 0 {
            return Err(OrmError::validation("UPDATE has nothing to SET"));
        }
        Ok(())
    }

    fn write_to(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self.where_clause.is_empty() && !self.allow_empty_where {
            return Err(OrmError::MissingWhere("UPDATE"));
        }
        let table = match &self.table {
            Some(t) => t.clone(),
            None => match self.sets.iter().find_map(|s| match s {
                SetItem::Model(rows) => Some(rows),
                SetItem::Assign(..) => None,
            }) {
                Some(rows) => rows.table(c.dialect())?,
                None => return Err(OrmError::validation("UPDATE needs a table")),
            },
        };

        c.push_str("UPDATE ");
        c.push_str(&table);
        self.write_sets(c)?;
        self.where_clause.write(c)?;
        if let Some(n) = self.limit {
            c.push_str(" LIMIT ");
            c.push_arg(Value::Int(n));
        }
        if !self.returning.is_empty() && c.dialect().supports_returning() {
            c.push_str(" RETURNING ");
            c.push_str(&self.returning.join(", "));
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

impl_where_methods!(UpdateQb);
