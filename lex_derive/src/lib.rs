//! Derive macros used by the `tmlc` AST.
//!
//! `LooseEq` generates a `PartialEq` impl that compares enum variants by tag
//! only, ignoring any fields (in particular the `SourceSpan` every AST node
//! carries). Tests want to assert "this parsed to a `Call` expression", not
//! "this parsed to a `Call` expression at exactly these byte offsets".

mod loose_eq;

use proc_macro::TokenStream;

#[proc_macro_derive(LooseEq)]
pub fn derive_loose_eq(input: TokenStream) -> TokenStream {
    let ast = syn::parse(input).unwrap();

    loose_eq::impl_loose_eq_macro(ast)
}
