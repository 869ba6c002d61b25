//! Procedural macros for declaring and replacing configuration functions.
//!
//! `#[replaceable]` turns a plain function into a configuration function
//! backed by the global registry. `#[replace("name")]` installs a function as
//! the override for a name once the registration hooks run. Expanded code
//! refers to the `knob` facade crate.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{
    Expr, ExprLit, FnArg, Ident, ItemFn, Lit, LitStr, Meta, Pat, ReturnType, Token, Type,
    parse_macro_input,
};

/// Declares a configuration function.
///
/// The function keeps its signature. Its body becomes the default, and each
/// call resolves the active implementation through the global registry. The
/// configuration name defaults to the module path plus the function name with
/// `::` turned into `.`, or can be given explicitly:
///
/// ```ignore
/// /// Whether debug output is enabled.
/// #[knob::replaceable]
/// pub fn debug() -> bool {
///     false
/// }
///
/// #[knob::replaceable("app_module")]
/// pub fn app_module() -> String {
///     "app.app".to_owned()
/// }
/// ```
///
/// Doc comments are recorded as the description shown by introspection.
/// Generic, `async` and method functions are rejected, and arguments must be
/// owned types.
#[proc_macro_attribute]
pub fn replaceable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ReplaceableArgs);
    let function = parse_macro_input!(item as ItemFn);
    expand_replaceable(&args, function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Registers a function as the override for a configuration name.
///
/// The function itself is left untouched and stays directly callable. The
/// override is installed when `knob::install_overrides` (or the bootstrap)
/// runs. With `include_original`, the last parameter receives the original
/// implementation as `&dyn Fn(A) -> R`, where `A` is `()` for no other
/// parameters, the single parameter type, or a tuple of them:
///
/// ```ignore
/// #[knob::replace("app.greeting", include_original)]
/// fn louder(original: &dyn Fn(()) -> String) -> String {
///     original(()).to_uppercase()
/// }
/// ```
#[proc_macro_attribute]
pub fn replace(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ReplaceArgs);
    let function = parse_macro_input!(item as ItemFn);
    expand_replace(&args, function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct ReplaceableArgs {
    name: Option<LitStr>,
}

impl Parse for ReplaceableArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(Self { name: None });
        }
        let name = parse_name(input, "name")?;
        validate_name(&name)?;
        if !input.is_empty() {
            return Err(input.error("unexpected tokens after the configuration name"));
        }
        Ok(Self { name: Some(name) })
    }
}

struct ReplaceArgs {
    target: LitStr,
    include_original: bool,
}

impl Parse for ReplaceArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        if input.is_empty() {
            return Err(input.error("expected the configuration name to replace"));
        }
        let target = parse_name(input, "target")?;
        validate_name(&target)?;

        let mut include_original = false;
        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if !input.is_empty() {
                let flag: Ident = input.parse()?;
                if flag != "include_original" {
                    return Err(syn::Error::new(flag.span(), "expected `include_original`"));
                }
                include_original = true;
            }
        }
        if !input.is_empty() {
            return Err(input.error("unexpected tokens in #[replace]"));
        }

        Ok(Self {
            target,
            include_original,
        })
    }
}

/// Accepts either `"literal"` or `key = "literal"`.
fn parse_name(input: ParseStream<'_>, key: &str) -> syn::Result<LitStr> {
    if input.peek(LitStr) {
        return input.parse();
    }
    let ident: Ident = input.parse()?;
    if ident != key {
        return Err(syn::Error::new(
            ident.span(),
            format!("expected a string literal or `{key} = \"...\"`"),
        ));
    }
    input.parse::<Token![=]>()?;
    input.parse()
}

fn validate_name(name: &LitStr) -> syn::Result<()> {
    let value = name.value();
    let reason = if value.is_empty() {
        Some("configuration name cannot be empty")
    } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("configuration name cannot contain whitespace or control characters")
    } else if value.split('.').any(str::is_empty) {
        Some("configuration name cannot contain an empty segment")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(syn::Error::new(name.span(), reason)),
        None => Ok(()),
    }
}

/// Owned parameter types of a function, plus its return type.
struct Signature {
    inputs: Vec<(Box<Pat>, Box<Type>)>,
    output: Type,
}

impl Signature {
    fn from_fn(function: &ItemFn) -> syn::Result<Self> {
        let sig = &function.sig;
        if let Some(asyncness) = &sig.asyncness {
            return Err(syn::Error::new_spanned(
                asyncness,
                "configuration functions cannot be async",
            ));
        }
        if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
            return Err(syn::Error::new_spanned(
                &sig.generics,
                "configuration functions cannot be generic",
            ));
        }
        if let Some(variadic) = &sig.variadic {
            return Err(syn::Error::new_spanned(
                variadic,
                "configuration functions cannot be variadic",
            ));
        }

        let mut inputs = Vec::with_capacity(sig.inputs.len());
        for input in &sig.inputs {
            match input {
                FnArg::Receiver(receiver) => {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "configuration functions cannot take `self`",
                    ));
                }
                FnArg::Typed(typed) => inputs.push((typed.pat.clone(), typed.ty.clone())),
            }
        }

        let output = match &sig.output {
            ReturnType::Default => syn::parse_quote!(()),
            ReturnType::Type(_, ty) => (**ty).clone(),
        };

        Ok(Self { inputs, output })
    }

    fn reject_borrowed_inputs(&self) -> syn::Result<()> {
        for (_, ty) in &self.inputs {
            match ty.as_ref() {
                Type::Reference(_) => {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "configuration function arguments must be owned",
                    ));
                }
                Type::ImplTrait(_) => {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "configuration function arguments cannot be `impl Trait`",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Argument type, destructuring pattern, forwarding parameters and the
/// argument expression for a list of parameters.
struct Arguments {
    ty: TokenStream2,
    pattern: TokenStream2,
    params: Vec<TokenStream2>,
    forward: Vec<Ident>,
    packed: TokenStream2,
}

fn arguments(inputs: &[(Box<Pat>, Box<Type>)]) -> Arguments {
    let forward: Vec<Ident> = (0..inputs.len())
        .map(|index| format_ident!("__knob_arg{}", index))
        .collect();
    let types: Vec<&Type> = inputs.iter().map(|(_, ty)| ty.as_ref()).collect();
    let patterns: Vec<&Pat> = inputs.iter().map(|(pat, _)| pat.as_ref()).collect();
    let params = forward
        .iter()
        .zip(&types)
        .map(|(ident, ty)| quote!(#ident: #ty))
        .collect();

    let (ty, pattern, packed) = match inputs.len() {
        0 => (quote!(()), quote!(()), quote!(())),
        1 => {
            let (ty, pattern, ident) = (types[0], patterns[0], &forward[0]);
            (quote!(#ty), quote!(#pattern), quote!(#ident))
        }
        _ => (
            quote!((#(#types),*)),
            quote!((#(#patterns),*)),
            quote!((#(#forward),*)),
        ),
    };

    Arguments {
        ty,
        pattern,
        params,
        forward,
        packed,
    }
}

fn description(function: &ItemFn) -> TokenStream2 {
    let lines: Vec<String> = function
        .attrs
        .iter()
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(meta) if meta.path.is_ident("doc") => match &meta.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(text),
                    ..
                }) => Some(text.value().trim().to_owned()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let text = lines.join("\n").trim().to_owned();
    if text.is_empty() {
        quote!(::core::option::Option::None)
    } else {
        quote!(::core::option::Option::Some(#text))
    }
}

fn expand_replaceable(args: &ReplaceableArgs, function: ItemFn) -> syn::Result<TokenStream2> {
    let signature = Signature::from_fn(&function)?;
    signature.reject_borrowed_inputs()?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = function.clone();
    let ident = &sig.ident;
    let function_name = ident.to_string();
    let output = &signature.output;
    let arguments = arguments(&signature.inputs);
    let Arguments {
        ty: arg_ty,
        pattern,
        params,
        packed,
        ..
    } = &arguments;

    let explicit = match &args.name {
        Some(name) => quote!(::core::option::Option::Some(#name)),
        None => quote!(::core::option::Option::None),
    };
    let description = description(&function);
    let handle = format_ident!("__KNOB_{}", function_name.to_uppercase());
    let declare_fn = format_ident!("__knob_declare_{}", function_name);
    let hook = format_ident!("__knob_declare_hook_{}", function_name);

    let (original, declare, call) = if signature.inputs.is_empty() {
        (
            quote! {
                fn __knob_original() -> #output #block
            },
            quote!(::knob::__private::declare),
            quote!(#handle.get()),
        )
    } else {
        (
            quote! {
                fn __knob_original(#pattern: #arg_ty) -> #output #block
            },
            quote!(::knob::__private::declare_with_args),
            quote!(#handle.call(#packed)),
        )
    };

    let fn_token = &sig.fn_token;
    let constness = &sig.constness;
    let unsafety = &sig.unsafety;
    let abi = &sig.abi;

    Ok(quote! {
        #[doc(hidden)]
        fn #declare_fn() -> ::knob::Configurable<#arg_ty, #output> {
            #original
            #declare(
                ::core::module_path!(),
                #function_name,
                #explicit,
                #description,
                __knob_original,
            )
        }

        #[doc(hidden)]
        static #handle: ::std::sync::LazyLock<::knob::Configurable<#arg_ty, #output>> =
            ::std::sync::LazyLock::new(#declare_fn);

        // Stores the default again on every run, so declarations survive a reset.
        #[doc(hidden)]
        fn #hook() {
            let _ = #declare_fn();
        }

        ::knob::__private::inventory::submit! {
            ::knob::DeclarationHook::new(
                ::core::concat!(::core::module_path!(), "::", #function_name),
                #hook,
            )
        }

        #(#attrs)*
        #vis #constness #unsafety #abi #fn_token #ident(#(#params),*) -> #output {
            #call
        }
    })
}

fn expand_replace(args: &ReplaceArgs, function: ItemFn) -> syn::Result<TokenStream2> {
    let mut signature = Signature::from_fn(&function)?;
    let ident = &function.sig.ident;
    let target = &args.target;
    let output = &signature.output;
    let hook = format_ident!("__knob_replace_{}", ident);

    let install = if args.include_original {
        if signature.inputs.pop().is_none() {
            return Err(syn::Error::new(
                Span::call_site(),
                "`include_original` needs a last parameter receiving the original function",
            ));
        }
        signature.reject_borrowed_inputs()?;
        let Arguments {
            ty, params, forward, ..
        } = arguments(&signature.inputs);
        let pattern = closure_pattern(&params, &forward);
        quote! {
            registry.replace_with_original(
                #target,
                |#pattern: #ty, original: &dyn Fn(#ty) -> #output| #ident(#(#forward,)* original),
            )
        }
    } else {
        signature.reject_borrowed_inputs()?;
        let Arguments {
            ty, params, forward, ..
        } = arguments(&signature.inputs);
        let pattern = closure_pattern(&params, &forward);
        quote! {
            registry.replace(#target, |#pattern: #ty| #ident(#(#forward),*))
        }
    };

    Ok(quote! {
        #function

        #[doc(hidden)]
        fn #hook(registry: &::knob::Registry) -> ::knob::RegistryResult<()> {
            #install.map(|_| ())
        }

        ::knob::__private::inventory::submit! {
            ::knob::OverrideHook::new(#target, #hook)
        }
    })
}

fn closure_pattern(params: &[TokenStream2], forward: &[Ident]) -> TokenStream2 {
    match params.len() {
        0 => quote!(()),
        1 => {
            let ident = &forward[0];
            quote!(#ident)
        }
        _ => quote!((#(#forward),*)),
    }
}
