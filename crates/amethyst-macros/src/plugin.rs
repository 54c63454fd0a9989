use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, Path, Type};

use crate::widget::{expand_widget, is_widget_attr};

// ─── Attribute arguments ─────────────────────────────────────────────────────

/// Parsed `#[plugin(crate = path, name = "…")]`.
#[derive(Default)]
struct PluginArgs {
    krate: Option<Path>,
    name: Option<LitStr>,
}

fn parse_args(attr: TokenStream) -> syn::Result<PluginArgs> {
    let mut args = PluginArgs::default();
    if attr.is_empty() {
        return Ok(args);
    }
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("crate") {
            args.krate = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("name") {
            args.name = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("expected `crate` or `name`"));
        }
        Ok(())
    });
    syn::parse::Parser::parse2(parser, attr)?;
    Ok(args)
}

/// Paths of the facade modules the generated code refers to.
pub struct Paths {
    pub fw: TokenStream,
    pub core: TokenStream,
}

impl Paths {
    fn new(krate: Option<&Path>) -> Self {
        let krate = krate.map_or_else(|| quote! { ::amethyst }, |path| quote! { #path });
        Self {
            fw: quote! { #krate::framework },
            core: quote! { #krate::core },
        }
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Extract the text of `#[doc = "…"]` attributes and join with newlines.
/// Returns `None` when there are no doc attrs.
pub fn doc_attrs_to_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter_map(|attr| {
            if let syn::Meta::NameValue(nv) = &attr.meta
                && attr.path().is_ident("doc")
                && let syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) = &nv.value
            {
                return Some(s.value().trim().to_owned());
            }
            None
        })
        .collect();
    let text = lines.join("\n");
    if text.trim().is_empty() {
        None
    } else {
        Some(text.trim().to_owned())
    }
}

/// The associated `fn new(..)` of the block, if any.
fn constructor(item: &ItemImpl) -> Option<&ImplItemFn> {
    item.items.iter().find_map(|item| match item {
        ImplItem::Fn(method)
            if method.sig.ident == "new"
                && !matches!(method.sig.inputs.first(), Some(FnArg::Receiver(_))) =>
        {
            Some(method)
        }
        _ => None,
    })
}

fn constructor_types(method: &ImplItemFn) -> syn::Result<Vec<Type>> {
    if method.sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            method.sig.asyncness,
            "plugin constructors must be synchronous",
        ));
    }
    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &method.sig.generics,
            "plugin constructors cannot be generic",
        ));
    }
    method
        .sig
        .inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(typed) => Ok((*typed.ty).clone()),
            FnArg::Receiver(receiver) => {
                Err(syn::Error::new_spanned(receiver, "unexpected receiver"))
            }
        })
        .collect()
}

// ─── Code generation ──────────────────────────────────────────────────────────

pub fn expand(attr: TokenStream, mut item: ItemImpl) -> syn::Result<TokenStream> {
    let args = parse_args(attr)?;
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "`#[plugin]` goes on an inherent impl block",
        ));
    }
    let paths = Paths::new(args.krate.as_ref());
    let fw = &paths.fw;

    // Deps and construct
    let (deps, construct) = match constructor(&item) {
        Some(method) => {
            let types = constructor_types(method)?;
            let bindings: Vec<_> = (0..types.len())
                .map(|index| quote::format_ident!("__dep_{}", index))
                .collect();
            (
                quote! { (#(#types,)*) },
                quote! {
                    fn construct((#(#bindings,)*): Self::Deps) -> Self {
                        Self::new(#(#bindings),*)
                    }
                },
            )
        }
        None => (
            quote! { () },
            quote! {
                fn construct((): Self::Deps) -> Self {
                    <Self as ::core::default::Default>::default()
                }
            },
        ),
    };

    // Widgets, in declaration order
    let mut registrations = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        if let Some(tokens) = expand_widget(method, &paths)? {
            registrations.push(tokens);
        }
        method.attrs.retain(|attr| !is_widget_attr(attr));
    }

    let name = args.name.map(|name| {
        quote! {
            fn name() -> &'static str {
                #name
            }
        }
    });

    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let self_ty = &item.self_ty;
    let widgets = (!registrations.is_empty()).then(|| {
        quote! {
            fn widgets(widgets: &mut #fw::Widgets<Self>) -> #fw::WidgetResult<()> {
                #(#registrations)*
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        #item

        impl #impl_generics #fw::Plugin for #self_ty #where_clause {
            type Deps = #deps;

            #construct

            #widgets

            #name
        }
    })
}
