//! SQL dialect descriptors.
//!
//! A dialect supplies the few facts the compiler and builders need about the
//! target database: how placeholders look, how identifiers are quoted, and
//! which lexical forms the placeholder scanner has to step over.

use std::fmt;
use std::sync::Arc;

/// How a dialect spells bound-argument placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// A single reusable `?`.
    Question,
    /// Numbered markers (`$1`, `$2`, ...).
    Numbered,
}

/// Dialect descriptor consumed by the compiler and the statement builders.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Dialect name (`postgres`, `mysql`, `sqlite`).
    fn name(&self) -> &'static str;

    /// Placeholder text for the 1-based argument `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Quote a single identifier segment (no dots).
    fn quote_ident(&self, segment: &str) -> String;

    /// Whether `RETURNING` clauses are understood.
    fn supports_returning(&self) -> bool;

    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle::Question
    }

    /// `\'` stays inside a single-quoted literal.
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// `$tag$ ... $tag$` regions are string literals.
    fn dollar_quoting(&self) -> bool {
        false
    }

    /// Backticks delimit identifiers.
    fn backtick_identifiers(&self) -> bool {
        false
    }

    /// `?`, `?|` and `?&` are native operators, so a `?` marker next to them is ambiguous.
    fn marker_collides_with_operators(&self) -> bool {
        false
    }

    /// `UPDATE ... LIMIT n` / `DELETE ... LIMIT n` are accepted.
    fn supports_update_limit(&self) -> bool {
        false
    }

    /// LIMIT value meaning "no limit", for dialects that reject OFFSET without LIMIT.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }
}

fn quote_with(segment: &str, quote: char) -> String {
    let mut out = String::with_capacity(segment.len() + 2);
    out.push(quote);
    for c in segment.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// PostgreSQL: `"ident"`, `$n` placeholders, RETURNING, dollar-quoted strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn quote_ident(&self, segment: &str) -> String {
        quote_with(segment, '"')
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle::Numbered
    }

    fn dollar_quoting(&self) -> bool {
        true
    }

    fn marker_collides_with_operators(&self) -> bool {
        true
    }
}

/// MySQL: `` `ident` ``, `?` placeholders, backslash escapes, UPDATE/DELETE LIMIT.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_ident(&self, segment: &str) -> String {
        quote_with(segment, '`')
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn backtick_identifiers(&self) -> bool {
        true
    }

    fn supports_update_limit(&self) -> bool {
        true
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}

/// SQLite: `"ident"`, `?` placeholders, RETURNING.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_ident(&self, segment: &str) -> String {
        quote_with(segment, '"')
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }
}

/// Resolve a driver name to a built-in dialect.
pub fn from_name(driver: &str) -> Option<Arc<dyn Dialect>> {
    match driver.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "pgx" | "pq" => Some(Arc::new(Postgres)),
        "mysql" | "mariadb" => Some(Arc::new(MySql)),
        "sqlite" | "sqlite3" => Some(Arc::new(Sqlite)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(Postgres.quote_ident("users"), "\"users\"");
        assert_eq!(Postgres.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySql.quote_ident("users"), "`users`");
        assert_eq!(MySql.quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn placeholders() {
        assert_eq!(Postgres.placeholder(3), "$3");
        assert_eq!(MySql.placeholder(3), "?");
        assert_eq!(Sqlite.placeholder(1), "?");
    }

    #[test]
    fn resolves_driver_names() {
        assert_eq!(from_name("PostgreSQL").map(|d| d.name()), Some("postgres"));
        assert_eq!(from_name("pgx").map(|d| d.name()), Some("postgres"));
        assert_eq!(from_name(" mysql ").map(|d| d.name()), Some("mysql"));
        assert_eq!(from_name("sqlite3").map(|d| d.name()), Some("sqlite"));
        assert!(from_name("oracle").is_none());
    }

    #[test]
    fn capabilities() {
        assert!(Postgres.supports_returning());
        assert!(!MySql.supports_returning());
        assert_eq!(Postgres.marker_style(), MarkerStyle::Numbered);
        assert_eq!(MySql.marker_style(), MarkerStyle::Question);
        assert!(MySql.supports_update_limit());
        assert!(!Postgres.supports_update_limit());
    }
}
