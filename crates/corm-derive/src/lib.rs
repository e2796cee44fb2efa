//! Derive macros for corm
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod model;
mod syn_types;

/// Derive `corm::schema::Model` for a struct.
///
/// # Example
///
/// ```ignore
/// use corm::Model;
///
/// #[derive(Model)]
/// #[db(table = "users")]
/// struct User {
///     #[db("id,pk,auto")]
///     id: i64,
///     username: String,
///     #[db("email_address,omitempty")]
///     email: Option<String>,
///     #[db("-")]
///     cached: Vec<String>,
///     #[db(embed)]
///     audit: Audit,
/// }
/// ```
///
/// # Attributes
///
/// - `#[db(table = "name")]` on the struct - table name (default: type name in `snake_case`)
/// - `#[db("column,opts")]` - column name and options (`pk`, `auto`, `readonly`, `omitempty`)
/// - `#[db("-")]` - not mapped
/// - `#[db(embed)]` - promote the fields of a nested `Model` (or `Option<Model>`)
///
/// Mapped field types must be `Clone + Into<corm::Value>`.
#[proc_macro_derive(Model, attributes(db))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
