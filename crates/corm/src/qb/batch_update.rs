//! Batch UPDATE compiled to one statement with a CASE expression per column.
//!
//! ```text
//! UPDATE t SET
//!   a = CASE key WHEN k1 THEN v1 WHEN k2 THEN v2 ELSE a END,
//!   b = CASE key WHEN k1 THEN b  WHEN k2 THEN v3 ELSE b END
//! WHERE key IN (k1, k2) [AND extra]
//! ```
//!
//! Column order follows the declared (or derived) columns, row order follows
//! input order. A [`Cell::Keep`] writes the column itself, leaving that cell
//! unchanged.

use super::Qb;
use super::model_rows::ModelRows;
use super::where_clause::{WhereClause, impl_where_methods};
use crate::compile::{BuiltQuery, Compiler};
use crate::error::{OrmError, OrmResult};
use crate::ident::{IdentKind, normalize_column};
use crate::schema::{Model, WritePolicy};
use crate::value::Value;
use std::collections::BTreeMap;

/// New value for one cell of a batch update.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Set(Value),
    /// Leave the current value.
    Keep,
}

impl<T: Into<Value>> From<T> for Cell {
    fn from(v: T) -> Self {
        Cell::Set(v.into())
    }
}

/// One explicit row: the key value plus per-column cells.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    key: Value,
    cells: Vec<(String, Cell)>,
}

impl BatchRow {
    pub fn new(key: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            cells: Vec::new(),
        }
    }

    pub fn set(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cell(column, Cell::Set(value.into()))
    }

    pub fn keep(self, column: impl Into<String>) -> Self {
        self.cell(column, Cell::Keep)
    }

    pub fn cell(mut self, column: impl Into<String>, cell: Cell) -> Self {
        self.cells.push((column.into(), cell));
        self
    }

    fn get(&self, column: &str) -> Cell {
        let key = normalize_column(column);
        self.cells
            .iter()
            .rev()
            .find(|(c, _)| normalize_column(c) == key)
            .map(|(_, cell)| cell.clone())
            .unwrap_or(Cell::Keep)
    }
}

#[derive(Clone, Debug)]
enum Source {
    Empty,
    Rows(Vec<BatchRow>),
    Maps(Vec<BTreeMap<String, Value>>),
    Models(ModelRows),
}

/// Resolved statement shape.
struct Plan {
    /// Unquoted column names.
    columns: Vec<String>,
    keys: Vec<Value>,
    /// `cells[row][column]`
    cells: Vec<Vec<Cell>>,
}

/// CASE-WHEN batch UPDATE builder.
///
/// Rows come from explicit [`BatchRow`]s, column/value maps or models. For
/// models, the zero value of an `omitempty` field is always keep-current.
#[derive(Clone, Debug)]
pub struct BatchUpdate {
    qb: Qb,
    error: Option<OrmError>,
    table: Option<String>,
    key: String,
    columns: Vec<String>,
    policy: WritePolicy,
    source: Source,
    where_clause: WhereClause,
}

impl BatchUpdate {
    pub(crate) fn new(qb: Qb, table: &str) -> Self {
        let mut this = Self {
            qb,
            error: None,
            table: None,
            key: "id".to_string(),
            columns: Vec::new(),
            policy: WritePolicy::default(),
            source: Source::Empty,
            where_clause: WhereClause::default(),
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

    /// Key column matched in `CASE key WHEN ...` (default `id`).
    pub fn key(mut self, column: &str) -> Self {
        if self.quote(column, IdentKind::Single).is_some() {
            self.key = column.trim().to_string();
        }
        self
    }

    /// Columns to update, in order. The key column may not be listed.
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

    // ==================== Rows ====================

    fn add_source(&mut self, more: Source) {
        if self.error.is_some() {
            return;
        }
        if matches!(self.source, Source::Empty) {
            self.source = more;
            return;
        }
        let result = match (&mut self.source, more) {
            (Source::Rows(have), Source::Rows(more)) => {
                have.extend(more);
                Ok(())
            }
            (Source::Maps(have), Source::Maps(more)) => {
                have.extend(more);
                Ok(())
            }
            (Source::Models(have), Source::Models(more)) => have.append(more),
            _ => Err(OrmError::validation(
                "cannot mix row sources in one batch update",
            )),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// Explicit rows.
    pub fn rows(mut self, rows: impl IntoIterator<Item = BatchRow>) -> Self {
        let rows: Vec<_> = rows.into_iter().collect();
        if !rows.is_empty() {
            self.add_source(Source::Rows(rows));
        }
        self
    }

    /// Rows from column/value maps. Each map must carry the key column; a
    /// column missing from a map is keep-current for that row.
    pub fn maps<R, I, K, V>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let rows: Vec<BTreeMap<String, Value>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            .collect();
        if !rows.is_empty() {
            self.add_source(Source::Maps(rows));
        }
        self
    }

    /// Rows from models of one type. Primary key, auto and readonly fields
    /// are left out unless included.
    pub fn models<T: Model>(mut self, models: &[T]) -> Self {
        if self.error.is_some() || models.is_empty() {
            return self;
        }
        match ModelRows::capture(self.qb.schemas(), models) {
            Ok(rows) => self.add_source(Source::Models(rows)),
            Err(e) => self.fail(e),
        }
        self
    }

    // ==================== Build ====================

    fn check_declared_columns(&self) -> OrmResult<()> {
        let key = normalize_column(&self.key);
        match self.columns.iter().find(|c| normalize_column(c) == key) {
            Some(c) => Err(OrmError::validation(format!(
                "batch update cannot include key column {c:?}"
            ))),
            None => Ok(()),
        }
    }

    fn plan(&self) -> OrmResult<Plan> {
        self.check_declared_columns()?;
        let plan = match &self.source {
            Source::Empty => return Err(OrmError::validation("batch update has no rows")),
            Source::Rows(rows) => self.plan_rows(rows)?,
            Source::Maps(rows) => self.plan_maps(rows)?,
            Source::Models(rows) => self.plan_models(rows)?,
        };
        if plan.columns.is_empty() {
            return Err(OrmError::validation("batch update has no columns"));
        }
        Ok(plan)
    }

    fn plan_rows(&self, rows: &[BatchRow]) -> OrmResult<Plan> {
        let key = normalize_column(&self.key);
        let columns = if self.columns.is_empty() {
            let mut seen: Vec<String> = Vec::new();
            for row in rows {
                for (c, _) in &row.cells {
                    let n = normalize_column(c);
                    if n == key {
                        return Err(OrmError::validation(format!(
                            "batch update cannot include key column {c:?}"
                        )));
                    }
                    if !seen.iter().any(|s| normalize_column(s) == n) {
                        seen.push(c.trim().to_string());
                    }
                }
            }
            seen
        } else {
            self.columns.clone()
        };

        let keys = rows.iter().map(|r| r.key.clone()).collect();
        let cells = rows
            .iter()
            .map(|r| columns.iter().map(|c| r.get(c)).collect())
            .collect();
        Ok(Plan {
            columns,
            keys,
            cells,
        })
    }

    fn plan_maps(&self, rows: &[BTreeMap<String, Value>]) -> OrmResult<Plan> {
        let key = normalize_column(&self.key);
        let columns = match (self.columns.is_empty(), rows.first()) {
            (false, _) => self.columns.clone(),
            (true, Some(first)) => first
                .keys()
                .filter(|k| normalize_column(k) != key)
                .cloned()
                .collect(),
            (true, None) => Vec::new(),
        };

        let mut keys = Vec::with_capacity(rows.len());
        let mut cells = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let by_key: BTreeMap<String, &Value> =
                row.iter().map(|(k, v)| (normalize_column(k), v)).collect();
            let Some(k) = by_key.get(&key) else {
                return Err(OrmError::structural(format!(
                    "map row {i} has no key column {:?}",
                    self.key
                )));
            };
            keys.push((*k).clone());
            cells.push(
                columns
                    .iter()
                    .map(|c| match by_key.get(&normalize_column(c)) {
                        Some(v) => Cell::Set((*v).clone()),
                        None => Cell::Keep,
                    })
                    .collect(),
            );
        }
        Ok(Plan {
            columns,
            keys,
            cells,
        })
    }

    fn plan_models(&self, rows: &ModelRows) -> OrmResult<Plan> {
        let schema = &rows.schema;
        let Some(key_idx) = rows.position(&self.key) else {
            return Err(OrmError::invalid_model(format!(
                "{} has no field for key column {:?}",
                schema.type_name, self.key
            )));
        };

        let fields: Vec<usize> = if self.columns.is_empty() {
            rows.fields(&self.policy)
                .map(|(i, _)| i)
                .filter(|i| *i != key_idx)
                .collect()
        } else {
            let mut out = Vec::with_capacity(self.columns.len());
            for col in &self.columns {
                let Some(idx) = rows.position(col) else {
                    return Err(OrmError::invalid_model(format!(
                        "{} has no field for column {col:?}",
                        schema.type_name
                    )));
                };
                if !self.policy.admits(&schema.fields[idx]) {
                    return Err(OrmError::validation(format!(
                        "column {col:?} is excluded from writes (primary key, auto or readonly)"
                    )));
                }
                out.push(idx);
            }
            out
        };

        let mut keys = Vec::with_capacity(rows.len());
        let mut cells = Vec::with_capacity(rows.len());
        for r in 0..rows.len() {
            keys.push(rows.cell(r, key_idx)?);
            let mut row = Vec::with_capacity(fields.len());
            for &idx in &fields {
                let v = rows.cell(r, idx)?;
                if v.is_zero() && schema.fields[idx].omit_empty {
                    row.push(Cell::Keep);
                } else {
                    row.push(Cell::Set(v));
                }
            }
            cells.push(row);
        }
        let columns = fields
            .iter()
            .map(|&i| schema.fields[i].column.clone())
            .collect();
        Ok(Plan {
            columns,
            keys,
            cells,
        })
    }

    fn write_to(&self, c: &mut Compiler<'_>) -> OrmResult<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let table = match (&self.table, &self.source) {
            (Some(t), _) => t.clone(),
            (None, Source::Models(rows)) => rows.table(c.dialect())?,
            (None, _) => return Err(OrmError::validation("batch update needs a table")),
        };
        let plan = self.plan()?;
        let dialect = c.dialect();
        let key = crate::ident::require(dialect, &self.key, IdentKind::Single)?;
        let columns = plan
            .columns
            .iter()
            .map(|col| crate::ident::require(dialect, col, IdentKind::Single))
            .collect::<OrmResult<Vec<_>>>()?;

        c.push_str("UPDATE ");
        c.push_str(&table);
        c.push_str(" SET ");
        for (ci, col) in columns.iter().enumerate() {
            if ci > 0 {
                c.push_str(", ");
            }
            c.push_str(col);
            c.push_str(" = CASE ");
            c.push_str(&key);
            for (ri, k) in plan.keys.iter().enumerate() {
                c.push_str(" WHEN ");
                c.push_arg(k.clone());
                c.push_str(" THEN ");
                match &plan.cells[ri][ci] {
                    Cell::Set(v) => c.push_arg(v.clone()),
                    Cell::Keep => c.push_str(col),
                }
            }
            c.push_str(" ELSE ");
            c.push_str(col);
            c.push_str(" END");
        }

        c.push_str(" WHERE ");
        c.push_str(&key);
        c.push_str(" IN (");
        c.push_arg_list(plan.keys.iter().cloned());
        c.push_str(")");
        self.where_clause.write_and(c)
    }

    /// Compile to SQL text and arguments.
    pub fn build(&self) -> OrmResult<BuiltQuery> {
        let mut c = self.qb.compiler();
        self.write_to(&mut c)?;
        c.finish()
    }
}

impl_where_methods!(BatchUpdate);
