//! Identifier validation and quoting.
//!
//! Table and column names often come from struct tags or caller-supplied
//! strings. Every identifier that reaches SQL text passes through here:
//!
//! - a simple identifier starts with a letter (any script) or `_` and
//!   continues with letters, digits or `_`
//! - at most two dotted segments (`table.column`, `schema.table`)
//! - `*` only as a whole segment, and only in select-column position
//!
//! Each segment is quoted by the dialect and the segments rejoined with `.`.
//!
//! # Example
//! ```ignore
//! use corm::dialect::Postgres;
//! use corm::ident;
//!
//! assert_eq!(ident::quote_ident(&Postgres, "u.id").as_deref(), Some("\"u\".\"id\""));
//! assert!(ident::quote_ident(&Postgres, "id; DROP TABLE users").is_none());
//! ```

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// Characters that disqualify an identifier wherever they appear.
const DENYLIST: &[char] = &[
    ' ', '(', ')', '+', '-', '/', '*', ',', '%', '<', '>', '=', '!', '|', '&', '^', '~', '?', ':',
    ';', '"', '`',
];

/// Operators accepted between a column and a subquery.
const SUBQUERY_OPS: &[&str] = &[
    "=", "!=", "<>", ">", "<", ">=", "<=", "IN", "NOT IN", "LIKE", "NOT LIKE",
];

/// A part of a validated identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Name(String),
    Wildcard,
}

/// Where an identifier is used, which decides the accepted forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    /// One segment, no wildcard (plain column, alias).
    Single,
    /// One or two segments, no wildcard (table, `table.column`).
    Qualified,
    /// Like `Qualified`, plus `*` or `table.*`.
    SelectColumn,
}

/// A validated identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Validate `raw` for the given usage.
    pub fn parse(raw: &str, kind: IdentKind) -> OrmResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(OrmError::invalid_identifier(raw));
        }

        let max_parts = if kind == IdentKind::Single { 1 } else { 2 };
        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() > max_parts {
            return Err(OrmError::invalid_identifier(raw));
        }

        let last = segments.len() - 1;
        let mut parts = Vec::with_capacity(segments.len());
        for (i, seg) in segments.iter().enumerate() {
            if *seg == "*" {
                if kind != IdentKind::SelectColumn || i != last {
                    return Err(OrmError::invalid_identifier(raw));
                }
                parts.push(IdentPart::Wildcard);
                continue;
            }
            if !is_simple_ident(seg) {
                return Err(OrmError::invalid_identifier(raw));
            }
            parts.push(IdentPart::Name((*seg).to_string()));
        }

        Ok(Self { parts })
    }

    /// Render with the dialect's quoting.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let mut out = String::new();
        self.write_sql(dialect, &mut out);
        out
    }

    pub(crate) fn write_sql(&self, dialect: &dyn Dialect, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Name(name) => out.push_str(&dialect.quote_ident(name)),
                IdentPart::Wildcard => out.push('*'),
            }
        }
    }
}

/// Whether `seg` is a single simple identifier.
pub fn is_simple_ident(seg: &str) -> bool {
    let mut chars = seg.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if seg.contains(DENYLIST) {
        return false;
    }
    if !(first == '_' || first.is_alphabetic()) {
        return false;
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Quote a table or `table.column` identifier.
pub fn quote_ident(dialect: &dyn Dialect, raw: &str) -> Option<String> {
    Ident::parse(raw, IdentKind::Qualified)
        .ok()
        .map(|id| id.to_sql(dialect))
}

/// Quote a single-segment column name.
pub fn quote_column(dialect: &dyn Dialect, raw: &str) -> Option<String> {
    Ident::parse(raw, IdentKind::Single)
        .ok()
        .map(|id| id.to_sql(dialect))
}

/// Quote a table or column alias.
pub fn quote_alias(dialect: &dyn Dialect, raw: &str) -> Option<String> {
    quote_column(dialect, raw)
}

/// Quote a select-list column, allowing `*` and `table.*`.
pub fn quote_select_column(dialect: &dyn Dialect, raw: &str) -> Option<String> {
    Ident::parse(raw, IdentKind::SelectColumn)
        .ok()
        .map(|id| id.to_sql(dialect))
}

/// Quote as `kind`, or fail with [`OrmError::InvalidIdentifier`].
pub(crate) fn require(dialect: &dyn Dialect, raw: &str, kind: IdentKind) -> OrmResult<String> {
    Ident::parse(raw, kind).map(|id| id.to_sql(dialect))
}

/// Normalize a subquery operator to its canonical upper-case form.
///
/// Inner whitespace is collapsed, so `"not   in"` becomes `"NOT IN"`.
pub fn normalize_subquery_op(op: &str) -> Option<&'static str> {
    let joined = op.split_whitespace().collect::<Vec<_>>().join(" ");
    let upper = joined.to_ascii_uppercase();
    SUBQUERY_OPS.iter().copied().find(|allowed| *allowed == upper)
}

/// Key used for case-insensitive column lookups.
///
/// Trims, strips quote characters, keeps the part after the last `.`, and lowercases.
pub fn normalize_column(raw: &str) -> String {
    let stripped: String = raw.trim().chars().filter(|c| *c != '`' && *c != '"').collect();
    let tail = match stripped.rfind('.') {
        Some(i) => &stripped[i + 1..],
        None => stripped.as_str(),
    };
    tail.to_lowercase()
}
