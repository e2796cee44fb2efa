//! Field values captured from models, resolved against a write policy at build time.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::ident::{self, IdentKind};
use crate::schema::{Field, Model, Schema, SchemaCache, WritePolicy};
use crate::value::Value;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub(crate) struct ModelRows {
    pub(crate) schema: Arc<Schema>,
    rows: Vec<Vec<Option<Value>>>,
}

impl ModelRows {
    pub(crate) fn capture<T: Model>(cache: &SchemaCache, models: &[T]) -> OrmResult<Self> {
        let schema = cache.parse::<T>()?;
        let rows = models
            .iter()
            .map(|m| schema.snapshot(m))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Self { schema, rows })
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append rows captured from the same model type.
    pub(crate) fn append(&mut self, other: ModelRows) -> OrmResult<()> {
        if self.schema.type_id != other.schema.type_id {
            return Err(OrmError::validation(format!(
                "cannot mix {} and {} rows",
                self.schema.type_name, other.schema.type_name
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Index of the field mapped to `column`, compared case-insensitively.
    pub(crate) fn position(&self, column: &str) -> Option<usize> {
        let key = ident::normalize_column(column);
        self.schema
            .fields
            .iter()
            .rposition(|f| ident::normalize_column(&f.column) == key)
    }

    /// Fields written under `policy`, as `(index, field)` in declaration order.
    pub(crate) fn fields<'s>(
        &'s self,
        policy: &'s WritePolicy,
    ) -> impl Iterator<Item = (usize, &'s Field)> + 's {
        self.schema
            .fields
            .iter()
            .enumerate()
            .filter(move |(_, f)| policy.admits(f))
    }

    /// Fields and values row `row` writes under `policy`, zero values included
    /// only where the policy keeps them.
    pub(crate) fn writes(
        &self,
        row: usize,
        policy: &WritePolicy,
    ) -> OrmResult<Vec<(usize, &Field, Value)>> {
        let cells = self.rows.get(row).map(Vec::as_slice).unwrap_or_default();
        self.schema.writes_from(cells, policy)
    }

    /// Value of field `field` in row `row`.
    pub(crate) fn cell(&self, row: usize, field: usize) -> OrmResult<Value> {
        self.rows
            .get(row)
            .and_then(|r| r.get(field))
            .cloned()
            .flatten()
            .ok_or_else(|| self.schema.unaddressable(&self.schema.fields[field]))
    }

    /// Quoted table from the model, used when the statement names none.
    pub(crate) fn table(&self, dialect: &dyn Dialect) -> OrmResult<String> {
        ident::require(dialect, &self.schema.table, IdentKind::Qualified).map_err(|_| {
            OrmError::invalid_identifier(format!(
                "{} (table of {})",
                self.schema.table, self.schema.type_name
            ))
        })
    }
}
