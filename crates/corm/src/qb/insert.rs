//! INSERT builder.

use super::Qb;
use super::model_rows::ModelRows;
use super::select::SelectQb;
use crate::compile::{BuiltQuery, Compiler};
use crate::error::{OrmError, OrmResult};
use crate::expr::Expr;
use crate::ident::{IdentKind, normalize_column};
use crate::schema::{Field, Model, WritePolicy};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug)]
enum Rows {
    Empty,
    Values(Vec<Vec<Value>>),
    Maps(Vec<BTreeMap<String, Value>>),
    Models { rows: ModelRows, single: bool },
    Select(Box<SelectQb>),
}

impl Rows {
    fn kind(&self) -> &'static str {
        match self {
            Rows::Empty => "none",
            Rows::Values(_) => "values",
            Rows::Maps(_) => "maps",
            Rows::Models { .. } => "models",
            Rows::Select(_) => "select",
        }
    }
}

/// INSERT statement builder.
///
/// Rows come from exactly one source: explicit `values`, key/value maps,
/// models, or a nested SELECT.
#[derive(Clone, Debug)]
pub struct InsertQb {
    qb: Qb,
    error: Option<OrmError>,
    table: Option<String>,
    columns: Vec<String>,
    rows: Rows,
    policy: WritePolicy,
    suffix: Vec<Expr>,
    returning: Vec<String>,
}

impl InsertQb {
    pub(crate) fn new(qb: Qb, table: &str) -> Self {
        let mut this = Self {
            qb,
            error: None,
            table: None,
            columns: Vec::new(),
            rows: Rows::Empty,
            policy: WritePolicy::default(),
            suffix: Vec::new(),
            returning: Vec::new(),
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

    fn quote(&mut self, raw: &str, kind: IdentKind) -> Option<String> {
        if self.error.is_some() {
            return None;
        }
        match crate::ident::require(self.qb.dialect(), raw, kind) {
            Ok(q) => Some(q),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn set_rows(&mut self, rows: Rows) {
        if self.error.is_some() {
            return;
        }
        if matches!(self.rows, Rows::Empty) {
            self.rows = rows;
            return;
        }
        match (&mut self.rows, rows) {
            (Rows::Values(have), Rows::Values(more)) => have.extend(more),
            (Rows::Maps(have), Rows::Maps(more)) => have.extend(more),
            (Rows::Models { rows: have, single }, Rows::Models { rows: more, .. }) => {
                *single = false;
                if let Err(e) = have.append(more) {
                    self.fail(e);
                }
            }
            (have, other) => {
                let msg = format!(
                    "cannot mix {} rows with {} rows",
                    have.kind(),
                    other.kind()
                );
                self.fail(OrmError::validation(msg));
            }
        }
    }

    // ==================== Columns & rows ====================

    /// Declare the column list.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            match self.quote(col.as_ref(), IdentKind::Single) {
                Some(_) => self.columns.push(col.as_ref().trim().to_string()),
                None => break,
            }
        }
        self
    }

    /// Append one row of values, matching the declared columns.
    pub fn values<I, V>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let row = row.into_iter().map(Into::into).collect();
        self.set_rows(Rows::Values(vec![row]));
        self
    }

    /// Append one row from a column/value map.
    pub fn map<I, K, V>(self, row: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.maps([row])
    }

    /// Append rows from column/value maps.
    ///
    /// Without declared columns, the columns are the sorted keys and every row
    /// must have the same key set. With declared columns, keys match
    /// case-insensitively and extra keys are ignored.
    pub fn maps<R, I, K, V>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect();
        self.set_rows(Rows::Maps(rows));
        self
    }

    /// Insert one model. Zero values of `omitempty` fields are skipped
    /// unless `include_zero(true)`. A declared column list picks the columns
    /// instead.
    pub fn model<T: Model>(mut self, model: &T) -> Self {
        self.capture(std::slice::from_ref(model), true);
        self
    }

    /// Insert several models in one statement. Every row carries every
    /// written column.
    pub fn models<T: Model>(mut self, models: &[T]) -> Self {
        self.capture(models, false);
        self
    }

    fn capture<T: Model>(&mut self, models: &[T], single: bool) {
        if self.error.is_some() {
            return;
        }
        match ModelRows::capture(self.qb.schemas(), models) {
            Ok(rows) => self.set_rows(Rows::Models { rows, single }),
            Err(e) => self.fail(e),
        }
    }

    /// `INSERT INTO t (cols) SELECT ...`
    pub fn from_select(mut self, sub: SelectQb) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = self.qb.check_same_dialect(sub.qb()) {
            self.fail(e);
            return self;
        }
        self.set_rows(Rows::Select(Box::new(sub)));
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

    /// Raw text after the rows, e.g. `ON CONFLICT (id) DO NOTHING`.
    pub fn suffix_raw<I, V>(mut self, sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let expr = Expr::template(sql, args);
        if self.error.is_some() {
            return self;
        }
        match expr.check_bindable() {
            Ok(()) if !expr.is_empty() => self.suffix.push(expr),
            Ok(()) => {}
            Err(e) => self.fail(e),
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

    // ==================== Build ====================

    fn quoted_columns(&self, names: &[String]) -> OrmResult<Vec<String>> {
        names
            .iter()
            .map(|n| crate::ident::require(self.qb.dialect(), n, IdentKind::Single))
            .collect()
    }

    /// Column names and rows for the value-carrying sources.
    fn resolve(&self) -> OrmResult<(Vec<String>, Vec<Vec<Value>>)> {
        match &self.rows {
            Rows::Empty | Rows::Select(_) => Err(OrmError::validation("INSERT has no rows")),
            Rows::Values(rows) => {
                if self.columns.is_empty() {
                    return Err(OrmError::structural("values given without a column list"));
                }
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != self.columns.len() {
                        return Err(OrmError::structural(format!(
                            "row {i} has {} values for {} columns",
                            row.len(),
                            self.columns.len()
                        )));
                    }
                }
                Ok((self.columns.clone(), rows.clone()))
            }
            Rows::Maps(rows) => self.resolve_maps(rows),
            Rows::Models { rows, single } => self.resolve_models(rows, *single),
        }
    }

    fn resolve_maps(
        &self,
        rows: &[BTreeMap<String, Value>],
    ) -> OrmResult<(Vec<String>, Vec<Vec<Value>>)> {
        let Some(first) = rows.first() else {
            return Err(OrmError::validation("INSERT has no rows"));
        };

        if self.columns.is_empty() {
            let columns: Vec<String> = first.keys().cloned().collect();
            let mut out = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                if !row.keys().eq(first.keys()) {
                    return Err(OrmError::structural(format!(
                        "map row {i} has a different column set than row 0"
                    )));
                }
                out.push(row.values().cloned().collect());
            }
            return Ok((columns, out));
        }

        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let by_key: HashMap<String, &Value> =
                row.iter().map(|(k, v)| (normalize_column(k), v)).collect();
            let mut values = Vec::with_capacity(self.columns.len());
            for col in &self.columns {
                match by_key.get(&normalize_column(col)) {
                    Some(v) => values.push((*v).clone()),
                    None => {
                        return Err(OrmError::structural(format!(
                            "map row {i} is missing column {col:?}"
                        )));
                    }
                }
            }
            out.push(values);
        }
        Ok((self.columns.clone(), out))
    }

    fn resolve_models(
        &self,
        rows: &ModelRows,
        single: bool,
    ) -> OrmResult<(Vec<String>, Vec<Vec<Value>>)> {
        if rows.is_empty() {
            return Err(OrmError::validation("INSERT has no rows"));
        }

        let fields: Vec<(usize, &Field)> = if !self.columns.is_empty() {
            self.declared_fields(rows)?
        } else if single {
            rows.writes(0, &self.policy)?
                .into_iter()
                .map(|(idx, f, _)| (idx, f))
                .collect()
        } else {
            rows.fields(&self.policy).collect()
        };
        if fields.is_empty() {
            return Err(OrmError::validation(format!(
                "no writable columns in {}",
                rows.schema.type_name
            )));
        }

        let columns = fields.iter().map(|(_, f)| f.column.clone()).collect();
        let mut out = Vec::with_capacity(rows.len());
        for r in 0..rows.len() {
            let row = fields
                .iter()
                .map(|(idx, _)| rows.cell(r, *idx))
                .collect::<OrmResult<Vec<_>>>()?;
            out.push(row);
        }
        Ok((columns, out))
    }

    /// Declared columns resolved against the model, in declared order.
    ///
    /// Every declared column is written, zero values included.
    fn declared_fields<'r>(&self, rows: &'r ModelRows) -> OrmResult<Vec<(usize, &'r Field)>> {
        let schema = &rows.schema;
        self.columns
            .iter()
            .map(|col| {
                let idx = rows.position(col).ok_or_else(|| {
                    OrmError::invalid_model(format!(
                        "unknown column {col:?} for {}",
                        schema.type_name
                    ))
                })?;
                let field = &schema.fields[idx];
                if !self.policy.admits(field) {
                    return Err(OrmError::invalid_model(format!(
                        "column {col:?} of {} is excluded by the write policy",
                        schema.type_name
                    )));
                }
                Ok((idx, field))
            })
            .collect()
    }

    fn write_table(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        let table = match (&self.table, &self.rows) {
            (Some(t), _) => t.clone(),
            (None, Rows::Models { rows, .. }) => rows.table(c.dialect())?,
            (None, _) => return Err(OrmError::validation("INSERT needs a table")),
        };
        c.push_str("INSERT INTO ");
        c.push_str(&table);
        Ok(())
    }

    fn write_to(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.write_table(c)?;

        if let Rows::Select(sub) = &self.rows {
            if !self.columns.is_empty() {
                c.push_str(" (");
                c.push_str(&self.quoted_columns(&self.columns)?.join(", "));
                c.push_str(")");
            }
            c.push_str(" ");
            sub.write_to(c)?;
        } else {
            let (columns, rows) = self.resolve()?;
            c.push_str(" (");
            c.push_str(&self.quoted_columns(&columns)?.join(", "));
            c.push_str(") VALUES ");
            for (i, row) in rows.into_iter().enumerate() {
                if i > 0 {
                    c.push_str(", ");
                }
                c.push_str("(");
                c.push_arg_list(row);
                c.push_str(")");
            }
        }

        for s in &self.suffix {
            c.push_str(" ");
            c.push_expr(s)?;
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
