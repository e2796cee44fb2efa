//! `#[db(...)]` attribute parsing.

use syn::parse::ParseStream;
use syn::{Attribute, LitStr, Result};

/// Struct-level options.
#[derive(Default)]
pub struct StructAttrs {
    pub table: Option<String>,
}

/// How one field is declared.
pub enum FieldAttr {
    /// Column tag (`"col,opts"`), or none to use the field name.
    Column(Option<String>),
    /// `#[db("-")]`
    Skip,
    /// `#[db(embed)]`
    Embed,
}

pub fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut out = StructAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("db")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                let table = lit.value();
                if table.trim().is_empty() {
                    return Err(syn::Error::new(lit.span(), "table name cannot be blank"));
                }
                out.table = Some(table);
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"`"))
            }
        })?;
    }
    Ok(out)
}

pub fn parse_field_attr(attrs: &[Attribute]) -> Result<FieldAttr> {
    let mut out = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("db")) {
        if out.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[db] attribute"));
        }
        let parsed = attr.parse_args_with(|input: ParseStream| {
            if input.peek(LitStr) {
                let lit: LitStr = input.parse()?;
                let tag = lit.value();
                return Ok(if tag.trim() == "-" {
                    FieldAttr::Skip
                } else {
                    FieldAttr::Column(Some(tag))
                });
            }
            let ident: syn::Ident = input.parse()?;
            if ident == "embed" {
                Ok(FieldAttr::Embed)
            } else {
                Err(syn::Error::new(
                    ident.span(),
                    "expected a tag string (\"column,opts\" or \"-\") or `embed`",
                ))
            }
        })?;
        out = Some(parsed);
    }
    Ok(out.unwrap_or(FieldAttr::Column(None)))
}
