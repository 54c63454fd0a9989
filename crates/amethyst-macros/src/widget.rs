//! Widget attributes accepted on methods of a `#[plugin]` block.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, Ident, ImplItemFn, LitStr, Pat, Path, PathArguments, Type, TypeReference,
    ext::IdentExt,
    spanned::Spanned,
};

use crate::plugin::{Paths, doc_attrs_to_string};

/// Attribute names recognised as widget declarations.
const WIDGET_ATTRS: [&str; 4] = ["command", "event", "schedule", "context_menu"];

/// Returns `true` if `attr` is consumed by the macro.
pub fn is_widget_attr(attr: &Attribute) -> bool {
    WIDGET_ATTRS.iter().any(|name| attr.path().is_ident(name)) || attr.path().is_ident("describe")
}

// ─── Parsed attributes ───────────────────────────────────────────────────────

#[derive(Default)]
struct CommandArgs {
    name: Option<LitStr>,
    description: Option<LitStr>,
    nsfw: bool,
    hybrid: bool,
}

struct EventArgs {
    event: Path,
    name: Option<LitStr>,
}

struct ScheduleArgs {
    cron: LitStr,
    name: Option<LitStr>,
}

#[derive(Default)]
struct MenuArgs {
    name: Option<LitStr>,
    nsfw: bool,
}

enum WidgetAttr {
    Command(CommandArgs),
    Event(EventArgs),
    Schedule(ScheduleArgs),
    ContextMenu(MenuArgs),
}

fn parse_command(attr: &Attribute) -> syn::Result<CommandArgs> {
    let mut args = CommandArgs::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(args);
    }
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            args.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("description") {
            args.description = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("nsfw") {
            args.nsfw = true;
        } else if meta.path.is_ident("hybrid") {
            args.hybrid = true;
        } else {
            return Err(meta.error("expected `name`, `description`, `nsfw` or `hybrid`"));
        }
        Ok(())
    })?;
    Ok(args)
}

fn parse_event(attr: &Attribute) -> syn::Result<EventArgs> {
    let mut event = None;
    let mut name = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
        } else if event.is_none() {
            event = Some(meta.path);
        } else {
            return Err(meta.error("expected a single event followed by `name = \"…\"`"));
        }
        Ok(())
    })?;
    let event = event
        .ok_or_else(|| syn::Error::new_spanned(attr, "expected an event, e.g. `#[event(ON_READY)]`"))?;
    Ok(EventArgs { event, name })
}

fn parse_schedule(attr: &Attribute) -> syn::Result<ScheduleArgs> {
    attr.parse_args_with(|input: syn::parse::ParseStream| {
        let cron: LitStr = input.parse()?;
        let mut name = None;
        while !input.is_empty() {
            input.parse::<syn::Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            if key != "name" {
                return Err(syn::Error::new(key.span(), "expected `name = \"…\"`"));
            }
            input.parse::<syn::Token![=]>()?;
            name = Some(input.parse()?);
        }
        Ok(ScheduleArgs { cron, name })
    })
}

fn parse_menu(attr: &Attribute) -> syn::Result<MenuArgs> {
    let mut args = MenuArgs::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(args);
    }
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            args.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("nsfw") {
            args.nsfw = true;
        } else {
            return Err(meta.error("expected `name` or `nsfw`"));
        }
        Ok(())
    })?;
    Ok(args)
}

fn parse_widget_attr(method: &ImplItemFn) -> syn::Result<Option<WidgetAttr>> {
    let mut found = None;
    for attr in &method.attrs {
        let parsed = if attr.path().is_ident("command") {
            WidgetAttr::Command(parse_command(attr)?)
        } else if attr.path().is_ident("event") {
            WidgetAttr::Event(parse_event(attr)?)
        } else if attr.path().is_ident("schedule") {
            WidgetAttr::Schedule(parse_schedule(attr)?)
        } else if attr.path().is_ident("context_menu") {
            WidgetAttr::ContextMenu(parse_menu(attr)?)
        } else {
            continue;
        };
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a method can declare only one widget",
            ));
        }
        found = Some(parsed);
    }
    Ok(found)
}

/// `#[describe(a = "…", b = "…")]` entries, in declaration order.
fn parse_describe(attrs: &[Attribute]) -> syn::Result<Vec<(Ident, LitStr)>> {
    let mut entries = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("describe")) {
        attr.parse_nested_meta(|meta| {
            let ident = meta
                .path
                .get_ident()
                .cloned()
                .ok_or_else(|| meta.error("expected a parameter name"))?;
            entries.push((ident, meta.value()?.parse()?));
            Ok(())
        })?;
    }
    Ok(entries)
}

// ─── Method signature ────────────────────────────────────────────────────────

struct Param {
    ident: Ident,
    ty: Type,
}

/// The non-receiver parameters of `method`, which must take `&self`.
fn params(method: &ImplItemFn) -> syn::Result<Vec<Param>> {
    let sig = &method.sig;
    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "widget methods must take `&self`",
            ));
        }
    }

    sig.inputs
        .iter()
        .skip(1)
        .map(|arg| match arg {
            FnArg::Typed(typed) => match &*typed.pat {
                Pat::Ident(pat) => Ok(Param {
                    ident: pat.ident.clone(),
                    ty: (*typed.ty).clone(),
                }),
                other => Err(syn::Error::new_spanned(
                    other,
                    "widget parameters must be plain identifiers",
                )),
            },
            FnArg::Receiver(receiver) => {
                Err(syn::Error::new_spanned(receiver, "unexpected receiver"))
            }
        })
        .collect()
}

fn unraw(ident: &Ident) -> String {
    ident.unraw().to_string()
}

/// How an event payload parameter is taken.
enum PayloadParam {
    None,
    Ref,
    Arc,
    Owned,
}

fn payload_param(params: &[Param], method: &ImplItemFn) -> syn::Result<PayloadParam> {
    match params {
        [] => Ok(PayloadParam::None),
        [param] => Ok(match &param.ty {
            Type::Reference(_) => PayloadParam::Ref,
            Type::Path(path)
                if path
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == "Arc") =>
            {
                PayloadParam::Arc
            }
            _ => PayloadParam::Owned,
        }),
        _ => Err(syn::Error::new_spanned(
            &method.sig.inputs,
            "event handlers take at most one payload parameter",
        )),
    }
}

/// The option type declared for a command parameter: `&T` declares `T`,
/// `&str` declares `String`.
fn option_type(ty: &Type) -> (Type, bool) {
    match ty {
        Type::Reference(TypeReference { elem, .. }) => match &**elem {
            Type::Path(path) if path.qself.is_none() && path.path.is_ident("str") => {
                (syn::parse_quote!(::std::string::String), true)
            }
            elem => ((*elem).clone(), true),
        },
        ty => (ty.clone(), false),
    }
}

fn is_named_type(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path.segments.iter().all(|segment| {
        matches!(
            segment.arguments,
            PathArguments::None | PathArguments::AngleBracketed(_)
        )
    })
}

// ─── Code generation ─────────────────────────────────────────────────────────

/// Generates the registration statement for `method`, or `None` when it
/// declares no widget.
pub fn expand_widget(method: &ImplItemFn, paths: &Paths) -> syn::Result<Option<TokenStream>> {
    let attr = parse_widget_attr(method)?;
    if !matches!(attr, Some(WidgetAttr::Command(_)))
        && let Some(describe) = method.attrs.iter().find(|attr| attr.path().is_ident("describe"))
    {
        return Err(syn::Error::new_spanned(
            describe,
            "`#[describe]` requires `#[command]`",
        ));
    }

    let tokens = match attr {
        None => return Ok(None),
        Some(WidgetAttr::Command(args)) => expand_command(method, args, paths)?,
        Some(WidgetAttr::Event(args)) => expand_event(method, args, paths)?,
        Some(WidgetAttr::Schedule(args)) => expand_schedule(method, args, paths)?,
        Some(WidgetAttr::ContextMenu(args)) => expand_menu(method, args, paths)?,
    };
    Ok(Some(tokens))
}

fn call_suffix(method: &ImplItemFn) -> TokenStream {
    if method.sig.asyncness.is_some() {
        quote! { .await }
    } else {
        TokenStream::new()
    }
}

fn expand_command(method: &ImplItemFn, args: CommandArgs, paths: &Paths) -> syn::Result<TokenStream> {
    let Paths { fw, core } = paths;
    let ident = &method.sig.ident;
    let params = params(method)?;
    let Some((interaction, options)) = params.split_first() else {
        return Err(syn::Error::new_spanned(
            &method.sig.inputs,
            "commands take the interaction as their first parameter",
        ));
    };

    let describe = parse_describe(&method.attrs)?;
    for (name, _) in &describe {
        if !options.iter().any(|option| option.ident == *name) {
            return Err(syn::Error::new_spanned(
                name,
                format!("unknown parameter `{name}`"),
            ));
        }
    }

    let name = args
        .name
        .unwrap_or_else(|| LitStr::new(&unraw(ident), ident.span()));
    let description = args.description.map(|lit| lit.value()).or_else(|| doc_attrs_to_string(&method.attrs));
    let description = description.map(|text| quote! { .description(#text) });
    let nsfw = args.nsfw.then(|| quote! { .nsfw(true) });
    let hybrid = args.hybrid.then(|| quote! { .hybrid(true) });

    let mut declarations = Vec::new();
    let mut extractions = Vec::new();
    let mut arguments = Vec::new();
    for (index, option) in options.iter().enumerate() {
        let option_name = unraw(&option.ident);
        let (ty, by_ref) = option_type(&option.ty);
        if !is_named_type(&ty) {
            return Err(syn::Error::new(
                option.ty.span(),
                "command options must be named types such as `String` or `Option<i64>`",
            ));
        }
        let option_desc = describe
            .iter()
            .find(|(name, _)| *name == option.ident)
            .map_or_else(|| "...".to_string(), |(_, desc)| desc.value());
        let value = format_ident!("__option_{}", index);

        declarations.push(quote! {
            .option(#fw::CommandOption::of::<#ty>(#option_name, #option_desc))
        });
        extractions.push(quote! {
            let #value: #ty = match interaction.option::<#ty>(#option_name) {
                ::core::result::Result::Ok(value) => value,
                ::core::result::Result::Err(err) => {
                    return ::core::result::Result::Err(<#core::BoxError>::from(err));
                }
            };
        });
        arguments.push(if by_ref {
            quote! { &#value }
        } else {
            quote! { #value }
        });
    }

    let interaction_ty = &interaction.ty;
    let suffix = call_suffix(method);
    Ok(quote! {
        widgets.command(
            #fw::CommandWidget::new(
                #name,
                |this: ::std::sync::Arc<Self>, interaction: #core::Interaction| async move {
                    #(#extractions)*
                    let interaction: #interaction_ty = interaction;
                    #fw::HandlerOutput::into_result(this.#ident(interaction, #(#arguments),*)#suffix)
                },
            )
            #description
            #nsfw
            #hybrid
            #(#declarations)*
        )?;
    })
}

fn expand_event(method: &ImplItemFn, args: EventArgs, paths: &Paths) -> syn::Result<TokenStream> {
    let fw = &paths.fw;
    let ident = &method.sig.ident;
    let params = params(method)?;
    let payload = payload_param(&params, method)?;
    let event = &args.event;
    let label = args
        .name
        .unwrap_or_else(|| LitStr::new(&unraw(ident), ident.span()));

    let widget = if method.sig.asyncness.is_some() {
        let argument = match payload {
            PayloadParam::None => quote! {},
            PayloadParam::Ref => quote! { &payload },
            PayloadParam::Arc => quote! { payload },
            PayloadParam::Owned => quote! { ::core::clone::Clone::clone(&*payload) },
        };
        quote! {
            #fw::EventWidget::new(
                &#event,
                |this: ::std::sync::Arc<Self>, payload| async move {
                    let _ = &payload;
                    this.#ident(#argument).await
                },
            )?
        }
    } else {
        let argument = match payload {
            PayloadParam::None => quote! {},
            PayloadParam::Ref => quote! { payload },
            PayloadParam::Owned => quote! { ::core::clone::Clone::clone(payload) },
            PayloadParam::Arc => {
                return Err(syn::Error::new_spanned(
                    &params[0].ty,
                    "blocking event handlers take the payload by reference",
                ));
            }
        };
        quote! {
            #fw::EventWidget::blocking(&#event, |this: &Self, payload| {
                let _ = payload;
                this.#ident(#argument)
            })?
        }
    };

    Ok(quote! {
        widgets.event(#widget.name(#label))?;
    })
}

fn expand_schedule(method: &ImplItemFn, args: ScheduleArgs, paths: &Paths) -> syn::Result<TokenStream> {
    let fw = &paths.fw;
    let ident = &method.sig.ident;
    if !params(method)?.is_empty() {
        return Err(syn::Error::new_spanned(
            &method.sig.inputs,
            "schedules take no parameters besides `&self`",
        ));
    }
    let cron = &args.cron;
    let label = args
        .name
        .unwrap_or_else(|| LitStr::new(&unraw(ident), ident.span()));
    let suffix = call_suffix(method);

    Ok(quote! {
        widgets.schedule(
            #fw::ScheduleWidget::new(#cron, |this: ::std::sync::Arc<Self>| async move {
                this.#ident()#suffix
            })?
            .name(#label),
        )?;
    })
}

fn expand_menu(method: &ImplItemFn, args: MenuArgs, paths: &Paths) -> syn::Result<TokenStream> {
    let Paths { fw, core } = paths;
    let ident = &method.sig.ident;
    let params = params(method)?;
    let [interaction, subject] = params.as_slice() else {
        return Err(syn::Error::new_spanned(
            &method.sig.inputs,
            "Context menus require exactly 3 parameters",
        ));
    };

    let ident_name = unraw(ident);
    let interaction_ty = &interaction.ty;
    let subject_ty = &subject.ty;
    let name = args.name.map(|name| quote! { .name(#name) });
    let nsfw = args.nsfw.then(|| quote! { .nsfw(true) });
    let suffix = call_suffix(method);

    Ok(quote! {
        widgets.context_menu(
            #fw::ContextMenuWidget::new(
                #ident_name,
                |this: ::std::sync::Arc<Self>, interaction: #core::Interaction, subject: #subject_ty| async move {
                    let interaction: #interaction_ty = interaction;
                    #fw::HandlerOutput::into_result(this.#ident(interaction, subject)#suffix)
                },
            )
            #name
            #nsfw
        )?;
    })
}
