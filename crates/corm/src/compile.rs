//! Placeholder compiler.
//!
//! Fragments use `?` as a dialect-neutral argument marker. Compiling a
//! fragment scans it once, left to right, and only treats `?` as a marker in
//! normal mode: markers inside quoted literals, quoted identifiers, comments
//! and dollar-quoted regions are left alone.
//!
//! - `?` dialects: the text is kept as-is and the marker count must equal the
//!   argument count.
//! - numbered dialects: each marker becomes the next `$n` and the number of
//!   replacements must equal the argument count.
//!
//! A [`Compiler`] holds the state for one statement: output text, bound
//! arguments and the running placeholder index.

use crate::dialect::{Dialect, MarkerStyle};
use crate::error::{OrmError, OrmResult};
use crate::expr::Expr;
use crate::ident::Ident;
use crate::pool::ScratchPool;
use crate::value::Value;
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    LineComment,
    BlockComment,
}

/// Length of a `$tag$` opener at the start of `bytes`, if there is one.
///
/// Tags follow identifier rules, so `$1` is never mistaken for an opener.
fn dollar_tag_len(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'$') {
        return None;
    }
    let mut i = 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'$' => return Some(i + 1),
            b'0'..=b'9' if i == 1 => return None,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => i += 1,
            _ => return None,
        }
    }
    None
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Call `on_marker` with the byte offset of every normal-mode `?` in `sql`.
fn scan_markers(
    dialect: &dyn Dialect,
    sql: &str,
    mut on_marker: impl FnMut(usize) -> OrmResult<()>,
) -> OrmResult<()> {
    let bytes = sql.as_bytes();
    let mut mode = Mode::Normal;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match mode {
            Mode::Normal => match b {
                b'?' => on_marker(i)?,
                b'\'' => mode = Mode::SingleQuote,
                b'"' => mode = Mode::DoubleQuote,
                b'`' if dialect.backtick_identifiers() => mode = Mode::Backtick,
                b'-' if next == Some(b'-') => {
                    mode = Mode::LineComment;
                    i += 1;
                }
                b'/' if next == Some(b'*') => {
                    mode = Mode::BlockComment;
                    i += 1;
                }
                b'$' if dialect.dollar_quoting() => {
                    if let Some(tag_len) = dollar_tag_len(&bytes[i..]) {
                        let tag = &bytes[i..i + tag_len];
                        let body = i + tag_len;
                        // An unterminated opener is ordinary text.
                        if let Some(end) = find_bytes(&bytes[body..], tag) {
                            i = body + end + tag_len;
                            continue;
                        }
                    }
                }
                _ => {}
            },
            Mode::SingleQuote => match b {
                b'\\' if dialect.backslash_escapes() => i += 1,
                b'\'' if next == Some(b'\'') => i += 1,
                b'\'' => mode = Mode::Normal,
                _ => {}
            },
            Mode::DoubleQuote => match b {
                b'\\' if dialect.backslash_escapes() => i += 1,
                b'"' if next == Some(b'"') => i += 1,
                b'"' => mode = Mode::Normal,
                _ => {}
            },
            Mode::Backtick => match b {
                b'`' if next == Some(b'`') => i += 1,
                b'`' => mode = Mode::Normal,
                _ => {}
            },
            Mode::LineComment => {
                if b == b'\n' {
                    mode = Mode::Normal;
                }
            }
            Mode::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    mode = Mode::Normal;
                    i += 1;
                }
            }
        }
        i += 1;
    }
    Ok(())
}

/// Reject a marker that reads as one of the dialect's `?` operators.
fn check_operator_collision(sql: &[u8], marker: usize) -> OrmResult<()> {
    let mut j = marker + 1;
    while sql.get(j).is_some_and(|b| b.is_ascii_whitespace()) {
        j += 1;
    }
    let after = sql.get(j + 1).copied();
    match sql.get(j) {
        // `? ||` and `? &&` are concatenation / overlap with a bound left operand.
        Some(b'|') if j == marker + 1 && after != Some(b'|') => {
            Err(OrmError::OperatorCollision("?|"))
        }
        Some(b'&') if j == marker + 1 && after != Some(b'&') => {
            Err(OrmError::OperatorCollision("?&"))
        }
        Some(b'\'') | Some(b'"') => Err(OrmError::OperatorCollision("?")),
        _ => Ok(()),
    }
}

/// Rewrite `sql` for `dialect`, appending to `out`.
///
/// Returns the number of placeholders written. On error `out` is left as it was.
pub(crate) fn rewrite_into(
    dialect: &dyn Dialect,
    sql: &str,
    arg_count: usize,
    start_index: usize,
    out: &mut String,
) -> OrmResult<usize> {
    if sql.trim().is_empty() {
        if arg_count > 0 {
            return Err(OrmError::PlaceholderMismatch {
                expected: arg_count,
                found: 0,
            });
        }
        return Ok(0);
    }

    let rollback = out.len();
    let mut found = 0;
    match dialect.marker_style() {
        MarkerStyle::Question => {
            scan_markers(dialect, sql, |_| {
                found += 1;
                Ok(())
            })?;
            out.push_str(sql);
        }
        MarkerStyle::Numbered => {
            let bytes = sql.as_bytes();
            let collides = dialect.marker_collides_with_operators();
            let mut last = 0;
            let result = scan_markers(dialect, sql, |pos| {
                if collides {
                    check_operator_collision(bytes, pos)?;
                }
                out.push_str(&sql[last..pos]);
                out.push_str(&dialect.placeholder(start_index + found));
                found += 1;
                last = pos + 1;
                Ok(())
            });
            if let Err(e) = result {
                out.truncate(rollback);
                return Err(e);
            }
            out.push_str(&sql[last..]);
        }
    }

    if found != arg_count {
        out.truncate(rollback);
        return Err(OrmError::PlaceholderMismatch {
            expected: arg_count,
            found,
        });
    }
    Ok(found)
}

/// Compile one fragment starting at placeholder `start_index` (1-based).
///
/// Returns the dialect text and the next free index.
pub fn compile(
    dialect: &dyn Dialect,
    sql: &str,
    arg_count: usize,
    start_index: usize,
) -> OrmResult<(String, usize)> {
    let mut out = String::with_capacity(sql.len() + 8);
    let written = rewrite_into(dialect, sql, arg_count, start_index, &mut out)?;
    Ok((out, start_index + written))
}

/// A compiled statement: dialect SQL text and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }

    /// Arguments as references compatible with tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

/// Per-statement compiler state.
///
/// Not shared across statements or threads. Scratch space comes from the
/// pool when one is attached and goes back to it when the compiler is dropped.
pub struct Compiler<'a> {
    dialect: &'a dyn Dialect,
    pool: Option<&'a ScratchPool>,
    max_len: Option<usize>,
    buf: String,
    args: Vec<Value>,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            pool: None,
            max_len: None,
            buf: String::with_capacity(128),
            args: Vec::new(),
        }
    }

    /// Draw scratch space from `pool`.
    pub fn with_pool(dialect: &'a dyn Dialect, pool: &'a ScratchPool) -> Self {
        Self {
            dialect,
            pool: Some(pool),
            max_len: None,
            buf: pool.get(256),
            args: Vec::new(),
        }
    }

    /// Fail `finish()` when the SQL text exceeds `max_len` bytes.
    pub fn max_len(mut self, max_len: Option<usize>) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    /// Index the next bound argument will get.
    pub fn next_index(&self) -> usize {
        self.args.len() + 1
    }

    pub fn sql(&self) -> &str {
        &self.buf
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn push_ident(&mut self, ident: &Ident) {
        ident.write_sql(self.dialect, &mut self.buf);
    }

    /// Bind one argument and write its placeholder.
    pub fn push_arg(&mut self, value: Value) {
        let placeholder = self.dialect.placeholder(self.next_index());
        self.buf.push_str(&placeholder);
        self.args.push(value);
    }

    /// Bind a comma-separated list of arguments.
    pub fn push_arg_list(&mut self, values: impl IntoIterator<Item = Value>) {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.push_arg(v);
        }
    }

    /// Append a fragment, rewriting its markers.
    pub fn push_expr(&mut self, expr: &Expr) -> OrmResult<()> {
        let start = self.next_index();
        rewrite_into(
            self.dialect,
            &expr.sql,
            expr.args.len(),
            start,
            &mut self.buf,
        )?;
        self.args.extend(expr.args.iter().cloned());
        Ok(())
    }

    /// Take the compiled statement.
    pub fn finish(mut self) -> OrmResult<BuiltQuery> {
        if let Some(max) = self.max_len {
            if self.buf.len() > max {
                return Err(OrmError::validation(format!(
                    "statement is {} bytes, exceeding the maximum of {max}",
                    self.buf.len()
                )));
            }
        }
        let sql = self.buf.as_str().to_owned();
        let args = std::mem::take(&mut self.args);
        tracing::trace!(
            target: "corm::compile",
            dialect = self.dialect.name(),
            sql = %sql,
            args = args.len(),
            "compiled statement"
        );
        Ok(BuiltQuery { sql, args })
    }
}

impl Drop for Compiler<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.put(std::mem::take(&mut self.buf));
        }
    }
}
