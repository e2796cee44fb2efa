//! DELETE builder.

use super::Qb;
use super::where_clause::{WhereClause, impl_where_methods};
use crate::compile::{BuiltQuery, Compiler};
use crate::error::{OrmError, OrmResult};
use crate::ident::IdentKind;
use crate::value::Value;

/// DELETE statement builder.
///
/// # Safety
/// Compiling without a WHERE condition fails with [`OrmError::MissingWhere`].
/// Call [`DeleteQb::allow_empty_where`] to delete every row.
#[derive(Clone, Debug)]
pub struct DeleteQb {
    qb: Qb,
    error: Option<OrmError>,
    table: Option<String>,
    where_clause: WhereClause,
    limit: Option<i64>,
    returning: Vec<String>,
    allow_empty_where: bool,
}

impl DeleteQb {
    pub(crate) fn new(qb: Qb, table: &str) -> Self {
        let mut this = Self {
            qb,
            error: None,
            table: None,
            where_clause: WhereClause::default(),
            limit: None,
            returning: Vec::new(),
            allow_empty_where: false,
        };
        this.table = this.quote(table, IdentKind::Qualified);
        this
    }

    /// `LIMIT n`, for dialects that accept it on DELETE.
    pub fn limit(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !self.qb.dialect().supports_update_limit() {
            let name = self.qb.dialect().name();
            self.error = Some(OrmError::unsupported(name, "DELETE ... LIMIT"));
        } else if n < 0 {
            self.error = Some(OrmError::validation(format!("negative LIMIT: {n}")));
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

    pub fn allow_empty_where(mut self) -> Self {
        self.allow_empty_where = true;
        self
    }

    fn write_to(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self.where_clause.is_empty() && !self.allow_empty_where {
            return Err(OrmError::MissingWhere("DELETE"));
        }
        let Some(table) = &self.table else {
            return Err(OrmError::validation("DELETE needs a table"));
        };

        c.push_str("DELETE FROM ");
        c.push_str(table);
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

impl_where_methods!(DeleteQb);
