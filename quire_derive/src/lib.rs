//! Proc macros deriving the `Object` (read) and `ObjectWrite` (write) traits
//! of the `quire` crate for dictionary-backed PDF types.
//!
//! A struct maps to a PDF dictionary. Each field names its dictionary key:
//!
//! ```ignore
//! #[derive(Object, ObjectWrite)]
//! #[pdf(Type = "Page?")]
//! pub struct Page {
//!     #[pdf(key = "MediaBox")]
//!     pub media_box: Option<Rectangle>,
//!     #[pdf(key = "Rotate", default = "0")]
//!     pub rotate: i64,
//!     #[pdf(other)]
//!     pub other: Dict,
//! }
//! ```
//!
//! `Type = "Name"` asserts the dictionary's `/Type`; a trailing `?` makes the
//! entry optional. Any other struct-level `Key = "Value"` pair is checked the
//! same way. Field attributes: `key` (dictionary key), `default` (Rust
//! expression used when the key is absent), `skip` (ignore the field,
//! `Default::default()` on read), `other` (catch-all `Dict` receiving every
//! entry not claimed by another field), `indirect` (write the value as an
//! indirect object).
//!
//! An enum with unit variants maps to a PDF name; `#[pdf(name = "...")]` on a
//! variant overrides the spelling.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitStr};

#[proc_macro_derive(Object, attributes(pdf))]
pub fn object(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impl_object(&ast).into()
}

#[proc_macro_derive(ObjectWrite, attributes(pdf))]
pub fn object_write(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impl_object_write(&ast).into()
}

/// Struct-level `#[pdf(...)]` attributes.
#[derive(Default)]
struct GlobalAttrs {
    /// Checks on dictionary entries: (key, expected name, required).
    checks: Vec<(String, String, bool)>,
}

impl GlobalAttrs {
    fn from_ast(ast: &DeriveInput) -> GlobalAttrs {
        let mut attrs = GlobalAttrs::default();
        for attr in &ast.attrs {
            if !attr.path().is_ident("pdf") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                let key = meta
                    .path
                    .get_ident()
                    .expect("struct-level pdf attribute must be an identifier")
                    .to_string();
                let lit: LitStr = meta.value()?.parse()?;
                let mut value = lit.value();
                let required = if value.ends_with('?') {
                    value.pop();
                    false
                } else {
                    true
                };
                attrs.checks.push((key, value, required));
                Ok(())
            })
            .expect("malformed #[pdf(...)] attribute");
        }
        attrs
    }
}

/// Field-level `#[pdf(...)]` attributes.
#[derive(Default)]
struct FieldAttrs {
    key: Option<String>,
    default: Option<String>,
    name: Option<String>,
    skip: bool,
    other: bool,
    indirect: bool,
}

fn field_attrs(attrs: &[syn::Attribute]) -> FieldAttrs {
    let mut out = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("pdf") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                let lit: LitStr = meta.value()?.parse()?;
                out.key = Some(lit.value());
            } else if meta.path.is_ident("default") {
                let lit: LitStr = meta.value()?.parse()?;
                out.default = Some(lit.value());
            } else if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                out.name = Some(lit.value());
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("other") {
                out.other = true;
            } else if meta.path.is_ident("indirect") {
                out.indirect = true;
            } else {
                panic!("unknown pdf field attribute");
            }
            Ok(())
        })
        .expect("malformed #[pdf(...)] attribute");
    }
    out
}

fn named_fields(ast: &DeriveInput) -> Vec<&Field> {
    match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            _ => panic!("derive(Object) requires named fields"),
        },
        _ => unreachable!(),
    }
}

fn default_expr(src: &str) -> TokenStream2 {
    let expr: syn::Expr = syn::parse_str(src).expect("cannot parse `default` as an expression");
    quote! { #expr }
}

fn with_bound(ast: &DeriveInput, bound: TokenStream2) -> syn::Generics {
    let mut generics = ast.generics.clone();
    let params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
    if !params.is_empty() {
        let clause = generics.make_where_clause();
        for ident in params {
            clause
                .predicates
                .push(syn::parse2(quote! { #ident: #bound }).unwrap());
        }
    }
    generics
}

fn impl_object(ast: &DeriveInput) -> TokenStream2 {
    match &ast.data {
        Data::Struct(_) => impl_object_for_struct(ast),
        Data::Enum(data) => impl_object_for_enum(ast, data),
        Data::Union(_) => panic!("derive(Object) does not support unions"),
    }
}

fn impl_object_write(ast: &DeriveInput) -> TokenStream2 {
    match &ast.data {
        Data::Struct(_) => impl_object_write_for_struct(ast),
        Data::Enum(data) => impl_object_write_for_enum(ast, data),
        Data::Union(_) => panic!("derive(ObjectWrite) does not support unions"),
    }
}

fn impl_object_for_struct(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let attrs = GlobalAttrs::from_ast(ast);
    let generics = with_bound(ast, quote! { quire::object::Object + std::fmt::Debug });
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let checks = attrs.checks.iter().map(|(key, value, required)| {
        quote! {
            dict.expect(stringify!(#name), #key, #value, #required)?;
            dict.remove(#key);
        }
    });

    let mut lets = Vec::new();
    let mut inits = Vec::new();
    let mut other: Option<&Field> = None;
    for field in named_fields(ast) {
        let fa = field_attrs(&field.attrs);
        let ident = field.ident.as_ref().unwrap();
        inits.push(quote! { #ident });
        if fa.other {
            other = Some(field);
            continue;
        }
        if fa.skip {
            lets.push(quote! { let #ident = Default::default(); });
            continue;
        }
        let key = fa.key.unwrap_or_else(|| panic!("field {} lacks #[pdf(key)]", ident));
        let ty = &field.ty;
        let body = if let Some(default) = fa.default.as_deref() {
            let default = default_expr(default);
            quote! {
                match dict.remove(#key) {
                    Some(p) => <#ty as quire::object::Object>::from_primitive(p, resolve),
                    None => Ok(#default),
                }
            }
        } else {
            quote! {
                <#ty as quire::object::Object>::from_primitive(
                    dict.remove(#key).unwrap_or(quire::primitive::Primitive::Null),
                    resolve,
                )
            }
        };
        lets.push(quote! {
            let #ident = match #body {
                Ok(v) => v,
                Err(e) => return Err(quire::error::PdfError::FromField {
                    typ: stringify!(#name),
                    field: #key,
                    source: Box::new(e),
                }),
            };
        });
    }
    // the catch-all takes whatever the named fields left behind
    let other_let = other.map(|field| {
        let ident = field.ident.as_ref().unwrap();
        quote! { let #ident = dict; }
    });

    quote! {
        impl #impl_generics quire::object::Object for #name #ty_generics #where_clause {
            fn from_primitive(
                p: quire::primitive::Primitive,
                resolve: &impl quire::object::Resolve,
            ) -> quire::error::Result<Self> {
                let mut dict = p.into_dictionary(resolve)?;
                #(#checks)*
                #(#lets)*
                #other_let
                Ok(#name { #(#inits),* })
            }
        }
    }
}

fn impl_object_write_for_struct(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let attrs = GlobalAttrs::from_ast(ast);
    let generics = with_bound(ast, quote! { quire::object::ObjectWrite });
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let checks = attrs.checks.iter().map(|(key, value, _)| {
        quote! {
            dict.insert(#key, quire::primitive::Primitive::Name(#value.into()));
        }
    });

    let mut writes = Vec::new();
    let mut other_merge = None;
    for field in named_fields(ast) {
        let fa = field_attrs(&field.attrs);
        let ident = field.ident.as_ref().unwrap();
        if fa.skip {
            continue;
        }
        if fa.other {
            other_merge = Some(quote! {
                for (k, v) in self.#ident.iter() {
                    if !dict.contains_key(k.as_str()) {
                        dict.insert(k.clone(), v.clone());
                    }
                }
            });
            continue;
        }
        let key = fa.key.unwrap_or_else(|| panic!("field {} lacks #[pdf(key)]", ident));
        let indirect = if fa.indirect {
            quote! {
                let prim = match prim {
                    p @ quire::primitive::Primitive::Reference(_) => p,
                    quire::primitive::Primitive::Null => quire::primitive::Primitive::Null,
                    p => quire::primitive::Primitive::Reference(
                        update.create(p)?.get_ref().get_inner(),
                    ),
                };
            }
        } else {
            quote! {}
        };
        writes.push(quote! {
            {
                let prim = quire::object::ObjectWrite::to_primitive(&self.#ident, update)?;
                #indirect
                if !matches!(prim, quire::primitive::Primitive::Null) {
                    dict.insert(#key, prim);
                }
            }
        });
    }

    quote! {
        impl #impl_generics quire::object::ObjectWrite for #name #ty_generics #where_clause {
            fn to_primitive(
                &self,
                update: &mut impl quire::object::Updater,
            ) -> quire::error::Result<quire::primitive::Primitive> {
                let mut dict = quire::primitive::Dict::new();
                #(#checks)*
                #(#writes)*
                #other_merge
                Ok(quire::primitive::Primitive::Dictionary(dict))
            }
        }
    }
}

fn variant_names(data: &syn::DataEnum) -> Vec<(syn::Ident, String)> {
    data.variants
        .iter()
        .map(|var| {
            if !matches!(var.fields, Fields::Unit) {
                panic!("derive(Object) on enums requires unit variants");
            }
            let fa = field_attrs(&var.attrs);
            let name = fa.name.unwrap_or_else(|| var.ident.to_string());
            (var.ident.clone(), name)
        })
        .collect()
}

fn impl_object_for_enum(ast: &DeriveInput, data: &syn::DataEnum) -> TokenStream2 {
    let id = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let arms = variant_names(data).into_iter().map(|(ident, name)| {
        quote! { #name => Ok(#id::#ident), }
    });
    quote! {
        impl #impl_generics quire::object::Object for #id #ty_generics #where_clause {
            fn from_primitive(
                p: quire::primitive::Primitive,
                resolve: &impl quire::object::Resolve,
            ) -> quire::error::Result<Self> {
                let p = match p {
                    quire::primitive::Primitive::Reference(r) => resolve.resolve(r)?,
                    p => p,
                };
                match p {
                    quire::primitive::Primitive::Name(name) => match name.as_str() {
                        #(#arms)*
                        s => Err(quire::error::PdfError::UnknownVariant {
                            id: stringify!(#id),
                            name: s.into(),
                        }),
                    },
                    p => Err(quire::error::PdfError::UnexpectedPrimitive {
                        expected: "Name",
                        found: p.get_debug_name(),
                    }),
                }
            }
        }
    }
}

fn impl_object_write_for_enum(ast: &DeriveInput, data: &syn::DataEnum) -> TokenStream2 {
    let id = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let arms = variant_names(data).into_iter().map(|(ident, name)| {
        quote! { #id::#ident => #name, }
    });
    quote! {
        impl #impl_generics quire::object::ObjectWrite for #id #ty_generics #where_clause {
            fn to_primitive(
                &self,
                _update: &mut impl quire::object::Updater,
            ) -> quire::error::Result<quire::primitive::Primitive> {
                Ok(quire::primitive::Primitive::Name(
                    match *self {
                        #(#arms)*
                    }
                    .into(),
                ))
            }
        }
    }
}
