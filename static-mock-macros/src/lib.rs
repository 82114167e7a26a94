//! Procedural macros for static-mock
//!
//! This crate provides the `#[static_mock::interceptable]` attribute, which
//! routes every call of a free function through the current interception
//! hub before its real body runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use static_mock::prelude::*;
//!
//! #[interceptable]
//! fn greet(name: &str) -> String {
//!     format!("hello {name}")
//! }
//!
//! let scope = MockScope::new();
//! scope
//!     .expect(greet::pattern(any::<String>()).unwrap())
//!     .unwrap()
//!     .returns(|| "X".to_string());
//! assert_eq!(greet("world"), "X");
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ItemFn, Lit, LitStr, Pat, ReturnType, Signature, Token,
    Type, Visibility,
};

/// Configuration options for the interceptable macro.
#[derive(Default)]
struct InterceptConfig {
    /// Owner identity; defaults to `"<package>!<module path>"`
    owner: Option<String>,
    /// Function name recorded in signatures; defaults to the Rust name
    name: Option<String>,
    /// The function sits in an `impl` block
    associated: bool,
}

impl Parse for InterceptConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut config = InterceptConfig::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            if ident == "associated" {
                config.associated = true;
                if input.peek(Token![,]) {
                    input.parse::<Token![,]>()?;
                }
                continue;
            }
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "owner" => config.owner = Some(parse_str_lit(input, &ident)?),
                "name" => config.name = Some(parse_str_lit(input, &ident)?),
                _ => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {ident}"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(config)
    }
}

fn parse_str_lit(input: ParseStream, ident: &Ident) -> syn::Result<String> {
    match input.parse::<Lit>()? {
        Lit::Str(s) if !s.value().is_empty() => Ok(s.value()),
        lit => Err(syn::Error::new(
            lit.span(),
            format!("`{ident}` expects a non-empty string literal"),
        )),
    }
}

/// How one parameter of the annotated function takes part in a signature.
enum ParamKind {
    /// `T`, stored by clone.
    ByValue,
    /// `&T`, stored by clone of the pointee.
    ByRef,
    /// `&str`, stored as `String`.
    Str,
    /// `&[E]`, stored as `Vec<E>`.
    Slice,
    /// `&mut T`, an output slot.
    Out,
}

struct Param {
    ident: Ident,
    ty: Type,
    /// The type recorded in the shape.
    slot_ty: TokenStream2,
    kind: ParamKind,
}

fn classify(arg: &FnArg) -> syn::Result<Param> {
    let pat_type = match arg {
        FnArg::Typed(pat_type) => pat_type,
        FnArg::Receiver(receiver) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "interceptable functions cannot take `self`",
            ));
        }
    };

    let ident = match &*pat_type.pat {
        Pat::Ident(pat_ident) if pat_ident.subpat.is_none() && pat_ident.by_ref.is_none() => {
            pat_ident.ident.clone()
        }
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "interceptable parameters must be plain identifiers",
            ));
        }
    };

    let ty = (*pat_type.ty).clone();
    reject_impl_trait(&ty)?;

    let (slot_ty, kind) = match &ty {
        Type::Reference(reference) if reference.mutability.is_some() => {
            let elem = &reference.elem;
            (quote! { #elem }, ParamKind::Out)
        }
        Type::Reference(reference) => match &*reference.elem {
            Type::Path(path) if path.qself.is_none() && path.path.is_ident("str") => {
                (quote! { ::std::string::String }, ParamKind::Str)
            }
            Type::Slice(slice) => {
                let elem = &slice.elem;
                (quote! { ::std::vec::Vec<#elem> }, ParamKind::Slice)
            }
            elem => (quote! { #elem }, ParamKind::ByRef),
        },
        other => (quote! { #other }, ParamKind::ByValue),
    };

    Ok(Param {
        ident,
        ty,
        slot_ty,
        kind,
    })
}

fn reject_impl_trait(ty: &Type) -> syn::Result<()> {
    match ty {
        Type::ImplTrait(_) => Err(syn::Error::new_spanned(
            ty,
            "interceptable functions cannot be generic",
        )),
        Type::Reference(reference) => reject_impl_trait(&reference.elem),
        _ => Ok(()),
    }
}

fn mentions_self(tokens: TokenStream2) -> bool {
    tokens.into_iter().any(|tree| match tree {
        TokenTree::Ident(ident) => ident == "Self",
        TokenTree::Group(group) => mentions_self(group.stream()),
        _ => false,
    })
}

/// Associated functions must opt in; a module cannot live in an `impl`.
fn check_free_function(sig: &Signature) -> syn::Result<()> {
    let uses_self = sig.inputs.iter().any(|arg| match arg {
        FnArg::Typed(pat_type) => mentions_self(pat_type.ty.to_token_stream()),
        FnArg::Receiver(_) => false,
    }) || mentions_self(sig.output.to_token_stream());
    if uses_self {
        return Err(syn::Error::new_spanned(
            sig,
            "`Self` only exists in an `impl` block; use `#[interceptable(associated)]` \
             on associated functions",
        ));
    }
    Ok(())
}

/// Items inside the sibling module get the function's reach.
fn inner_visibility(vis: &Visibility) -> TokenStream2 {
    match vis {
        Visibility::Inherited => quote! { pub(super) },
        Visibility::Public(_) => quote! { pub },
        Visibility::Restricted(_) => quote! { pub(crate) },
    }
}

/// Make a free or associated function interceptable by mock scopes.
///
/// On every call the function first builds its concrete call signature and
/// dispatches it through the current thread's hub. If an expectation fires,
/// output parameters are written and the substitute return value is
/// returned; otherwise the original body runs unchanged.
///
/// A sibling module with the function's name is generated:
///
/// - `shape()` - the registered `FunctionShape`
/// - `pattern(..)` - a pattern, one `impl Into<Arg<T>>` per input
/// - `call(..)` - the concrete signature for given inputs
///
/// # Parameters
///
/// - `T` and `&T` are inputs stored by clone, and need
///   `Clone + PartialEq + Debug + Send + Sync + 'static`
/// - `&str` is an input stored as `String`, `&[E]` as `Vec<E>`
/// - `&mut T` is an output named after the parameter
///
/// Generic functions, `self` receivers and destructuring patterns are
/// rejected.
///
/// # Configuration Options
///
/// - `owner = "crate!module"` - Override the owner identity
/// - `name = "f"` - Override the function name
/// - `associated` - The function is an associated function of a non-generic
///   type. The owner defaults to `"<package>!<type path>"` and the helpers
///   become associated functions `f_shape()`, `f_pattern(..)` and `f_call(..)`
///
/// ```rust,ignore
/// impl Gateway {
///     #[interceptable(associated)]
///     pub fn charge(amount: u64) -> bool {
///         amount < 100
///     }
/// }
///
/// scope.expect(Gateway::charge_pattern(any::<u64>()).unwrap());
/// ```
///
/// ```rust,ignore
/// #[interceptable(owner = "legacy!billing", name = "charge")]
/// fn charge_card(amount: u64) -> bool {
///     gateway::charge(amount)
/// }
/// ```
///
/// # Panics
///
/// The generated function panics if the engine reports an error for the
/// call, for example a missing output binding.
#[proc_macro_attribute]
pub fn interceptable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as InterceptConfig);
    let input = parse_macro_input!(item as ItemFn);

    expand_interceptable(&config, &input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_interceptable(config: &InterceptConfig, input: &ItemFn) -> syn::Result<TokenStream2> {
    let sig = &input.sig;
    let name = &sig.ident;

    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "interceptable functions cannot be generic",
        ));
    }
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "interceptable functions cannot be async",
        ));
    }
    if let Some(constness) = &sig.constness {
        return Err(syn::Error::new_spanned(
            constness,
            "interceptable functions cannot be const",
        ));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(syn::Error::new_spanned(
            variadic,
            "interceptable functions cannot be variadic",
        ));
    }
    if !config.associated {
        check_free_function(sig)?;
    }

    let params = sig
        .inputs
        .iter()
        .map(classify)
        .collect::<syn::Result<Vec<_>>>()?;

    let return_ty = match &sig.output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => {
            reject_impl_trait(ty)?;
            quote! { #ty }
        }
    };

    let function_name = config.name.clone().unwrap_or_else(|| name.to_string());
    let owner = match &config.owner {
        Some(owner) => quote! { ::std::string::String::from(#owner) },
        None if config.associated => quote! {
            ::std::format!(
                "{}!{}",
                ::std::env!("CARGO_PKG_NAME"),
                ::std::any::type_name::<Self>()
            )
        },
        None => {
            let suffix = LitStr::new(&format!("::{name}"), name.span());
            quote! {{
                let module = ::std::module_path!();
                let parent = module.strip_suffix(#suffix).unwrap_or(module);
                ::std::format!("{}!{}", ::std::env!("CARGO_PKG_NAME"), parent)
            }}
        }
    };

    let shape_slots = params.iter().map(|p| {
        let slot_name = p.ident.to_string();
        let slot_ty = &p.slot_ty;
        match p.kind {
            ParamKind::Out => quote! { .output::<#slot_ty>(#slot_name) },
            _ => quote! { .input::<#slot_ty>(#slot_name) },
        }
    });
    let shape_returns = match &sig.output {
        ReturnType::Default => quote! {},
        ReturnType::Type(_, ty) => quote! { .returns::<#ty>() },
    };

    let inputs: Vec<&Param> = params
        .iter()
        .filter(|p| !matches!(p.kind, ParamKind::Out))
        .collect();
    let outputs: Vec<&Param> = params
        .iter()
        .filter(|p| matches!(p.kind, ParamKind::Out))
        .collect();

    let pattern_params = inputs.iter().map(|p| {
        let ident = &p.ident;
        let slot_ty = &p.slot_ty;
        quote! { #ident: impl ::std::convert::Into<::static_mock::Arg<#slot_ty>> }
    });
    let pattern_args = inputs.iter().map(|p| {
        let ident = &p.ident;
        let slot_ty = &p.slot_ty;
        quote! { .matching::<#slot_ty>(::std::convert::Into::into(#ident)) }
    });

    // `call` borrows every input so the function keeps ownership of its own.
    let call_params = inputs.iter().map(|p| {
        let ident = &p.ident;
        let ty = &p.ty;
        match p.kind {
            ParamKind::ByValue => quote! { #ident: &#ty },
            _ => quote! { #ident: #ty },
        }
    });
    let call_args = inputs.iter().map(|p| {
        let ident = &p.ident;
        match p.kind {
            ParamKind::Str => quote! { .arg(::std::string::ToString::to_string(#ident)) },
            ParamKind::Slice => quote! { .arg(#ident.to_vec()) },
            _ => quote! { .arg(::std::clone::Clone::clone(#ident)) },
        }
    });
    let call_site_args = inputs.iter().map(|p| {
        let ident = &p.ident;
        match p.kind {
            ParamKind::ByValue => quote! { &#ident },
            _ => quote! { #ident },
        }
    });

    let handled_ident = format_ident!("__static_mock_handled");
    let write_outputs = outputs.iter().map(|p| {
        let ident = &p.ident;
        let slot_ty = &p.slot_ty;
        let slot_name = p.ident.to_string();
        quote! {
            *#ident = #handled_ident
                .outputs()
                .get::<#slot_ty>(#slot_name)
                .unwrap_or_else(|err| ::std::panic!("{}", err));
        }
    });

    let attrs = &input.attrs;
    let vis = &input.vis;
    let body = &input.block;
    let call_ident = format_ident!("__static_mock_call");

    let (shape_fn, pattern_fn, call_fn, call_path) = if config.associated {
        let shape_fn = format_ident!("{}_shape", name);
        let pattern_fn = format_ident!("{}_pattern", name);
        let call_fn = format_ident!("{}_call", name);
        let call_path = quote! { Self::#call_fn };
        (shape_fn, pattern_fn, call_fn, call_path)
    } else {
        let call_path = quote! { #name::call };
        (
            format_ident!("shape"),
            format_ident!("pattern"),
            format_ident!("call"),
            call_path,
        )
    };
    let shape_path = if config.associated {
        quote! { Self::#shape_fn }
    } else {
        quote! { self::#shape_fn }
    };
    let helper_vis = if config.associated {
        quote! { #vis }
    } else {
        inner_visibility(vis)
    };

    let helpers = quote! {
        /// The registered shape of the function.
        #helper_vis fn #shape_fn() -> ::std::sync::Arc<::static_mock::FunctionShape> {
            static SHAPE: ::std::sync::OnceLock<::std::sync::Arc<::static_mock::FunctionShape>> =
                ::std::sync::OnceLock::new();
            ::std::sync::Arc::clone(SHAPE.get_or_init(|| {
                ::static_mock::FunctionShape::builder(#owner, #function_name)
                    #(#shape_slots)*
                    #shape_returns
                    .register()
            }))
        }

        /// A pattern over the function's inputs.
        ///
        /// # Errors
        ///
        /// Returns `AmbiguousSignature` if the pattern does not fit the shape.
        #helper_vis fn #pattern_fn(
            #(#pattern_params),*
        ) -> ::static_mock::Result<::static_mock::CallSignature> {
            #shape_path().pattern()#(#pattern_args)*.build()
        }

        /// The concrete signature of a call with these inputs.
        ///
        /// # Errors
        ///
        /// Returns `AmbiguousSignature` if the call does not fit the shape.
        #[allow(clippy::ptr_arg)]
        #helper_vis fn #call_fn(
            #(#call_params),*
        ) -> ::static_mock::Result<::static_mock::CallSignature> {
            #shape_path().call()#(#call_args)*.build()
        }
    };

    let function = quote! {
        #(#attrs)*
        #vis #sig {
            let #call_ident = #call_path(#(#call_site_args),*)
                .unwrap_or_else(|err| ::std::panic!("{}", err));
            match ::static_mock::dispatch(&#call_ident) {
                ::std::result::Result::Ok(::static_mock::HandleResult::Handled(mut #handled_ident)) => {
                    #(#write_outputs)*
                    return #handled_ident
                        .take_return::<#return_ty>()
                        .unwrap_or_else(|err| ::std::panic!("{}", err));
                }
                ::std::result::Result::Ok(::static_mock::HandleResult::NotHandled) => {}
                ::std::result::Result::Err(err) => ::std::panic!("{}", err),
            }
            #body
        }
    };

    if config.associated {
        return Ok(quote! {
            #function
            #helpers
        });
    }

    Ok(quote! {
        #function

        #[doc = ::std::concat!("Interception helpers for [`", ::std::stringify!(#name), "`].")]
        #[allow(unused_imports)]
        #vis mod #name {
            use super::*;

            #helpers
        }
    })
}
