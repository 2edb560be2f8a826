//! Derive macro for cleanenv secret manifests
//!
//! `#[derive(SecretConfig)]` turns per-field `#[secret(...)]` annotations into
//! a `SecretFields` implementation, so population needs no runtime reflection.
//!
//! ```ignore
//! #[derive(SecretConfig)]
//! struct AppConfig {
//!     #[secret(gcp = "projects/p/secrets/api-key/versions/latest")]
//!     api_key: String,
//!     #[secret(aws = "prod/db-password")]
//!     db_password: SecretString,
//!     #[secret(aws = "prod/build-sha", read_only)]
//!     build_sha: String,
//!     log_level: String,
//! }
//! ```
//!
//! Field keys:
//! - `gcp = "..."`: GCP Secret Manager resource name
//! - `aws = "..."`: AWS Secrets Manager name or ARN
//! - `read_only`: list the field but never write it
//!
//! Container key `#[secret(crate = "path")]` changes where the runtime types
//! are looked up (default `::cleanenv`).

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Path, parse_macro_input};

const ATTR: &str = "secret";

/// Implements `SecretFields` from `#[secret(...)]` field annotations
#[proc_macro_derive(SecretConfig, attributes(secret))]
pub fn derive_secret_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Annotation values collected from one field
#[derive(Default)]
struct FieldSecret {
    gcp: Option<LitStr>,
    aws: Option<LitStr>,
    read_only: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let krate = crate_path(&input.attrs)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "SecretConfig can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "SecretConfig requires a struct with named fields",
        ));
    };

    let mut entries = Vec::new();
    for field in &named.named {
        let Some(secret) = field_secret(&field.attrs)? else {
            continue;
        };
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.unraw().to_string();

        let mut entry = quote! { #krate::SecretField::new(#name, &mut self.#ident) };
        if let Some(gcp) = &secret.gcp {
            entry.extend(quote! { .gcp(#gcp) });
        }
        if let Some(aws) = &secret.aws {
            entry.extend(quote! { .aws(#aws) });
        }
        if secret.read_only {
            entry.extend(quote! { .read_only() });
        }
        entries.push(entry);
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #krate::SecretFields for #ident #ty_generics #where_clause {
            fn secret_fields(&mut self) -> ::std::vec::Vec<#krate::SecretField<'_>> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

/// Resolve `#[secret(crate = "...")]` on the container
fn crate_path(attrs: &[Attribute]) -> syn::Result<Path> {
    let mut krate: Option<Path> = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident(ATTR)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                if krate.is_some() {
                    return Err(meta.error("duplicate `crate` key"));
                }
                let lit: LitStr = meta.value()?.parse()?;
                krate = Some(lit.parse()?);
                return Ok(());
            }
            Err(meta.error("unsupported container key, expected `crate`"))
        })?;
    }
    Ok(krate.unwrap_or_else(|| syn::parse_quote!(::cleanenv)))
}

/// Parse every `#[secret(...)]` on a field; `None` when there is none
fn field_secret(attrs: &[Attribute]) -> syn::Result<Option<FieldSecret>> {
    let mut found = false;
    let mut secret = FieldSecret::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident(ATTR)) {
        found = true;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("gcp") {
                return set_once(&mut secret.gcp, &meta, "gcp");
            }
            if meta.path.is_ident("aws") {
                return set_once(&mut secret.aws, &meta, "aws");
            }
            if meta.path.is_ident("read_only") {
                if secret.read_only {
                    return Err(meta.error("duplicate `read_only` key"));
                }
                secret.read_only = true;
                return Ok(());
            }
            Err(meta.error("unsupported secret key, expected `gcp`, `aws` or `read_only`"))
        })?;
    }

    Ok(found.then_some(secret))
}

fn set_once(
    slot: &mut Option<LitStr>,
    meta: &syn::meta::ParseNestedMeta<'_>,
    key: &str,
) -> syn::Result<()> {
    if slot.is_some() {
        return Err(meta.error(format!("duplicate `{key}` key")));
    }
    *slot = Some(meta.value()?.parse()?);
    Ok(())
}
