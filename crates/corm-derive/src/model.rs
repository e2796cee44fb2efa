//! Model derive macro implementation

use crate::attrs::{FieldAttr, parse_field_attr, parse_struct_attrs};
use crate::syn_types::{option_inner, type_label};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let struct_attrs = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let mut decls = Vec::with_capacity(fields.len());
    let mut arms = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "unnamed field"));
        };
        let field_name = ident.unraw().to_string();
        let ty = &field.ty;
        let label = type_label(ty);

        match parse_field_attr(&field.attrs)? {
            FieldAttr::Skip => {
                decls.push(quote! {
                    ::corm::schema::FieldDecl::new(#field_name, ::core::option::Option::Some("-"), #label)
                });
            }
            FieldAttr::Column(tag) => {
                let tag = match tag {
                    Some(t) => quote!(::core::option::Option::Some(#t)),
                    None => quote!(::core::option::Option::None),
                };
                decls.push(quote! {
                    ::corm::schema::FieldDecl::new(#field_name, #tag, #label)
                });
                arms.push(quote! {
                    [#index] => ::core::option::Option::Some(::corm::Value::from(
                        ::core::clone::Clone::clone(&self.#ident),
                    )),
                });
            }
            FieldAttr::Embed => {
                let (inner, optional) = match option_inner(ty) {
                    Some(inner) => (inner, true),
                    None => (ty, false),
                };
                decls.push(quote! {
                    ::corm::schema::FieldDecl::embedded(
                        #field_name,
                        #label,
                        <#inner as ::corm::schema::Model>::shape,
                    )
                });
                let target = if optional {
                    quote!(self.#ident.as_ref()?)
                } else {
                    quote!(&self.#ident)
                };
                arms.push(quote! {
                    [#index, rest @ ..] => ::corm::schema::Model::field_value(#target, rest),
                });
            }
        }
    }

    let type_name = name.unraw().to_string();
    let table_name = struct_attrs.table.map(|table| {
        quote! {
            fn table_name() -> ::core::option::Option<::std::string::String> {
                ::core::option::Option::Some(::std::string::String::from(#table))
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::corm::schema::Model for #name #ty_generics #where_clause {
            fn shape() -> ::corm::schema::Shape {
                ::corm::schema::Shape::new(#type_name)
                    #(.field(#decls))*
            }

            #table_name

            fn field_value(&self, path: &[usize]) -> ::core::option::Option<::corm::Value> {
                match path {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(input: DeriveInput) -> String {
        expand(input).unwrap().to_string()
    }

    #[test]
    fn emits_table_and_arms() {
        let out = expand_str(syn::parse_quote! {
            #[db(table = "users")]
            struct User {
                #[db("id,pk")]
                id: i64,
                #[db("-")]
                cache: Vec<String>,
                name: String,
            }
        });
        assert!(out.contains("table_name"));
        assert!(out.contains("\"users\""));
        assert!(out.contains("\"id,pk\""));
        assert!(out.contains("[0usize]"));
        assert!(out.contains("[2usize]"));
        assert!(!out.contains("[1usize]"));
    }

    #[test]
    fn optional_embed_uses_question_mark() {
        let out = expand_str(syn::parse_quote! {
            struct Draft {
                id: i64,
                #[db(embed)]
                audit: Option<Audit>,
            }
        });
        assert!(out.contains("< Audit as :: corm :: schema :: Model > :: shape"));
        assert!(out.contains("as_ref () ?"));
        assert!(!out.contains("table_name"));
    }

    #[test]
    fn rejects_tuple_structs_and_unknown_options() {
        let err = expand(syn::parse_quote! { struct P(i64); }).unwrap_err();
        assert!(err.to_string().contains("named fields"));

        let err = expand(syn::parse_quote! {
            struct P {
                #[db(flatten)]
                x: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("embed"));

        let err = expand(syn::parse_quote! {
            #[db(table = " ")]
            struct P { x: i64 }
        })
        .unwrap_err();
        assert!(err.to_string().contains("blank"));
    }
}
