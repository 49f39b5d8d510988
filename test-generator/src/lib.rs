use proc_macro::TokenStream;
use proc_macro2::Literal;
use quote::quote;
use std::ffi::OsStr;
use syn::{parse_macro_input, spanned::Spanned};

fn error(span: proc_macro2::Span, message: &str) -> TokenStream {
    TokenStream::from(syn::Error::new(span, message).into_compile_error())
}

/// Generates one test for every file with the given extension found (recursively) in a directory.
/// The annotated function receives the path of the file.
///
/// Usage: `#[from_dir("dir", "extension")]`, or `#[from_dir("dir", "extension", ignore)]` to mark
/// all generated tests with `#[ignore]`.
#[proc_macro_attribute]
pub fn from_dir(args: TokenStream, input: TokenStream) -> TokenStream {
    let original_input = input.clone();

    let args = parse_macro_input!(args as syn::AttributeArgs);
    let mut strings = Vec::new();
    let mut ignore = false;
    for arg in &args {
        match arg {
            syn::NestedMeta::Lit(syn::Lit::Str(s)) => strings.push(s.value()),
            syn::NestedMeta::Meta(syn::Meta::Path(p)) if p.is_ident("ignore") => ignore = true,
            other => return error(other.span(), "unexpected macro argument"),
        }
    }
    let [dir, extension] = strings.as_slice() else {
        return error(
            proc_macro2::Span::call_site(),
            "expected a directory and a file extension",
        );
    };

    let func = parse_macro_input!(input as syn::ItemFn);
    if func.sig.inputs.len() != 1 {
        return error(func.span(), "function must have exactly one argument");
    }
    let func_ident = func.sig.ident;
    let ignore_attr = ignore.then(|| quote!(#[ignore]));

    let mut streams: Vec<TokenStream> = Vec::new();
    streams.push(original_input);

    let mut entries: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_file() && e.path().extension() == Some(OsStr::new(extension))
        })
        .collect();
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let Some(path) = entry.path().to_str() else {
            continue;
        };
        let new_name = format!(
            "{}_{}",
            func_ident,
            path.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_")
        );
        let new_ident = syn::Ident::new(&new_name, func_ident.span());
        let arg = Literal::string(path);
        streams.push(
            quote! {
                #[test]
                #ignore_attr
                #[allow(warnings)]
                fn #new_ident() {
                    #func_ident(#arg)
                }
            }
            .into(),
        );
    }

    TokenStream::from_iter(streams)
}
