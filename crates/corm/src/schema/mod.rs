//! Struct-to-table mapping metadata.
//!
//! A type opts in by implementing [`Model`] (normally through
//! `#[derive(Model)]`). The implementation describes the declared fields once
//! ([`Model::shape`]) and gives positional access to field values
//! ([`Model::field_value`]). Introspection turns the shape into an immutable
//! [`Schema`]: a flat arena of [`Field`]s with a path into the owner for each,
//! so later row operations index by position instead of re-inspecting values.
//!
//! Field annotations use the tag syntax `column,opt1,opt2`:
//!
//! | option | meaning |
//! |---|---|
//! | `pk` | primary key |
//! | `auto`, `autoincr`, `identity` | generated by the server |
//! | `readonly` | excluded from writes by default |
//! | `omitempty` | excluded from writes while it holds its zero value |
//!
//! A bare `-` excludes the field. Without a column name the field name in
//! `snake_case` is used. Without an explicit `pk`, a field mapped to column
//! `id` is the primary key.

mod cache;

pub use cache::{DEFAULT_SCHEMA_CACHE_CAPACITY, SchemaCache, SchemaCacheStats};

use crate::error::{OrmError, OrmResult};
use crate::ident::{is_simple_ident, normalize_column};
use crate::value::Value;
use heck::ToSnakeCase;
use std::any::TypeId;
use std::collections::HashMap;

/// Maximum nesting of embedded structs.
const MAX_EMBED_DEPTH: usize = 16;

/// A type that maps to table rows.
pub trait Model: 'static {
    /// Declared fields, in declaration order.
    fn shape() -> Shape;

    /// Table name override. Blank values are ignored.
    fn table_name() -> Option<String> {
        None
    }

    /// Value of the field at `path` (indices into [`Shape::fields`], one per
    /// embedding level). `None` when the path is not addressable, such as an
    /// absent optional embedded struct.
    fn field_value(&self, path: &[usize]) -> Option<Value>;
}

/// Declared structure of a model type.
#[derive(Debug, Clone)]
pub struct Shape {
    pub type_name: &'static str,
    pub fields: Vec<FieldDecl>,
}

impl Shape {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }
}

/// One declared field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecl {
    pub name: &'static str,
    pub tag: Option<&'static str>,
    pub type_name: &'static str,
    /// Shape of an embedded struct whose fields are promoted into the owner.
    pub embedded: Option<fn() -> Shape>,
}

impl FieldDecl {
    pub const fn new(name: &'static str, tag: Option<&'static str>, type_name: &'static str) -> Self {
        Self {
            name,
            tag,
            type_name,
            embedded: None,
        }
    }

    pub const fn embedded(name: &'static str, type_name: &'static str, shape: fn() -> Shape) -> Self {
        Self {
            name,
            tag: None,
            type_name,
            embedded: Some(shape),
        }
    }
}

/// Column metadata for one mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: String,
    pub path: Vec<usize>,
    pub declared_type: &'static str,
    pub primary_key: bool,
    pub auto: bool,
    pub readonly: bool,
    pub omit_empty: bool,
}

/// Immutable mapping metadata for one model type.
#[derive(Debug)]
pub struct Schema {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub table: String,
    pub fields: Vec<Field>,
    by_column: HashMap<String, usize>,
    primary_keys: Vec<usize>,
}

impl Schema {
    /// Field for `column`, matched case-insensitively.
    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.by_column
            .get(&normalize_column(column))
            .map(|&i| &self.fields[i])
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &Field> {
        self.primary_keys.iter().map(|&i| &self.fields[i])
    }

    /// First primary key, if any.
    pub fn primary_key(&self) -> Option<&Field> {
        self.primary_keys.first().map(|&i| &self.fields[i])
    }

    fn check_type<T: Model>(&self) -> OrmResult<()> {
        if TypeId::of::<T>() == self.type_id {
            return Ok(());
        }
        Err(OrmError::invalid_model(format!(
            "schema for {} used with {}",
            self.type_name,
            std::any::type_name::<T>()
        )))
    }

    pub(crate) fn unaddressable(&self, field: &Field) -> OrmError {
        OrmError::invalid_model(format!(
            "field {}.{} is not addressable",
            self.type_name, field.name
        ))
    }

    /// Read `field` from `model`.
    pub fn value<T: Model>(&self, model: &T, field: &Field) -> OrmResult<Value> {
        self.check_type::<T>()?;
        model
            .field_value(&field.path)
            .ok_or_else(|| self.unaddressable(field))
    }

    /// Every field of `model` in field order; `None` where a field is not
    /// addressable (inside an absent optional embed).
    pub(crate) fn snapshot<T: Model>(&self, model: &T) -> OrmResult<Vec<Option<Value>>> {
        self.check_type::<T>()?;
        Ok(self
            .fields
            .iter()
            .map(|f| model.field_value(&f.path))
            .collect())
    }

    /// Fields admitted for writing under `policy`, in declaration order.
    pub fn write_fields<'s>(&'s self, policy: &'s WritePolicy) -> impl Iterator<Item = &'s Field> {
        self.fields.iter().filter(move |f| policy.admits(f))
    }

    /// `(field, value)` pairs to write for one model, omitting zero values of
    /// omit-on-zero fields unless `policy.include_zero` is set.
    pub fn write_values<'s, T: Model>(
        &'s self,
        model: &T,
        policy: &WritePolicy,
    ) -> OrmResult<Vec<(&'s Field, Value)>> {
        let row = self.snapshot(model)?;
        Ok(self
            .writes_from(&row, policy)?
            .into_iter()
            .map(|(_, f, v)| (f, v))
            .collect())
    }

    /// Same as [`Schema::write_values`] over a snapshot row, keeping field indices.
    pub(crate) fn writes_from<'s>(
        &'s self,
        row: &[Option<Value>],
        policy: &WritePolicy,
    ) -> OrmResult<Vec<(usize, &'s Field, Value)>> {
        let mut out = Vec::with_capacity(self.fields.len());
        for (i, f) in self.fields.iter().enumerate() {
            if !policy.admits(f) {
                continue;
            }
            let v = row
                .get(i)
                .cloned()
                .flatten()
                .ok_or_else(|| self.unaddressable(f))?;
            if v.is_zero() && !policy.keeps_zero(f) {
                continue;
            }
            out.push((i, f, v));
        }
        Ok(out)
    }
}

/// Which fields a schema-derived write includes.
///
/// The default excludes primary keys, server-generated and readonly fields,
/// and honors `omitempty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePolicy {
    pub include_primary_key: bool,
    pub include_auto: bool,
    pub include_readonly: bool,
    pub include_zero: bool,
}

impl WritePolicy {
    pub fn admits(&self, f: &Field) -> bool {
        (!f.primary_key || self.include_primary_key)
            && (!f.auto || self.include_auto)
            && (!f.readonly || self.include_readonly)
    }

    /// Whether a zero value of `f` is written.
    pub fn keeps_zero(&self, f: &Field) -> bool {
        !f.omit_empty || self.include_zero
    }
}

#[derive(Debug, Default)]
struct TagOptions {
    column: String,
    primary_key: bool,
    auto: bool,
    readonly: bool,
    omit_empty: bool,
}

fn parse_tag(tag: &str) -> TagOptions {
    let mut parts = tag.split(',');
    let mut opts = TagOptions {
        column: parts.next().unwrap_or_default().trim().to_string(),
        ..Default::default()
    };
    for opt in parts {
        match opt.trim().to_ascii_lowercase().as_str() {
            "pk" => opts.primary_key = true,
            "auto" | "autoincr" | "identity" => opts.auto = true,
            "readonly" => opts.readonly = true,
            "omitempty" => opts.omit_empty = true,
            _ => {}
        }
    }
    opts
}

fn collect_fields(
    shape: &Shape,
    owner: &'static str,
    prefix: &[usize],
    depth: usize,
    out: &mut Vec<Field>,
) -> OrmResult<()> {
    if depth > MAX_EMBED_DEPTH {
        return Err(OrmError::introspection(
            owner,
            format!("embedding deeper than {MAX_EMBED_DEPTH} levels"),
        ));
    }

    for (i, decl) in shape.fields.iter().enumerate() {
        if decl.name.trim().is_empty() {
            return Err(OrmError::introspection(
                owner,
                format!("field #{i} of {} has no name", shape.type_name),
            ));
        }
        let tag = decl.tag.map(str::trim).unwrap_or_default();
        if tag == "-" {
            continue;
        }

        let mut path = Vec::with_capacity(prefix.len() + 1);
        path.extend_from_slice(prefix);
        path.push(i);

        if let Some(embedded) = decl.embedded {
            collect_fields(&embedded(), owner, &path, depth + 1, out)?;
            continue;
        }

        let opts = parse_tag(tag);
        let column = if opts.column.is_empty() {
            decl.name.to_snake_case()
        } else {
            opts.column
        };
        if !is_simple_ident(&column) {
            return Err(OrmError::introspection(
                owner,
                format!("field {} maps to invalid column {column:?}", decl.name),
            ));
        }

        out.push(Field {
            name: decl.name,
            column,
            path,
            declared_type: decl.type_name,
            primary_key: opts.primary_key,
            auto: opts.auto,
            readonly: opts.readonly,
            omit_empty: opts.omit_empty,
        });
    }
    Ok(())
}

/// Build the schema for `T`. Used by [`SchemaCache`]; prefer going through a cache.
pub(crate) fn introspect<T: Model>() -> OrmResult<Schema> {
    let shape = T::shape();
    let type_name = shape.type_name;
    if type_name.trim().is_empty() {
        return Err(OrmError::introspection(
            std::any::type_name::<T>(),
            "shape has no type name",
        ));
    }

    let mut fields = Vec::with_capacity(shape.fields.len());
    collect_fields(&shape, type_name, &[], 0, &mut fields)?;

    if !fields.iter().any(|f| f.primary_key) {
        if let Some(f) = fields.iter_mut().find(|f| f.column.eq_ignore_ascii_case("id")) {
            f.primary_key = true;
        }
    }

    let mut by_column = HashMap::with_capacity(fields.len());
    for (i, f) in fields.iter().enumerate() {
        by_column.insert(normalize_column(&f.column), i);
    }
    let primary_keys = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.primary_key)
        .map(|(i, _)| i)
        .collect();

    let table = T::table_name()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| type_name.to_snake_case());

    Ok(Schema {
        type_id: TypeId::of::<T>(),
        type_name,
        table,
        fields,
        by_column,
        primary_keys,
    })
}

#[cfg(test)]
pub(crate) mod fixtures;
