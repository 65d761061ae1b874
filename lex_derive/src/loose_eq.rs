use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DataStruct, DeriveInput, Fields, GenericParam, Generics, Ident};

/// Field names that never participate in "loose" equality: they carry source
/// position, not semantic content.
const IGNORED_FIELDS: &[&str] = &["position", "span"];

fn ast_type_params(generics: &Generics) -> Vec<&Ident> {
    generics
        .params
        .iter()
        .filter_map(|p| match p {
            GenericParam::Type(t) => Some(&t.ident),
            _ => None,
        })
        .collect()
}

pub fn impl_loose_eq_macro(ast: DeriveInput) -> TokenStream {
    let DeriveInput {
        ident,
        data,
        mut generics,
        ..
    } = ast;

    // Every type parameter must itself be PartialEq for the generated body
    // (which compares fields built from it) to type-check.
    {
        let clause = generics.make_where_clause();
        for param in ast_type_params(&generics) {
            clause
                .predicates
                .push(syn::parse_quote!(#param: std::cmp::PartialEq));
        }
    }

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = match data {
        Data::Enum(DataEnum { variants, .. }) => {
            let arms = variants.iter().map(|variant| {
                let var_ident = &variant.ident;
                match &variant.fields {
                    Fields::Unit => quote! {
                        (#ident::#var_ident, #ident::#var_ident) => true,
                    },
                    Fields::Unnamed(fields) => {
                        let lhs: Vec<Ident> = (0..fields.unnamed.len())
                            .map(|i| Ident::new(&format!("l{i}"), var_ident.span()))
                            .collect();
                        let rhs: Vec<Ident> = (0..fields.unnamed.len())
                            .map(|i| Ident::new(&format!("r{i}"), var_ident.span()))
                            .collect();
                        quote! {
                            (#ident::#var_ident(#(#lhs),*), #ident::#var_ident(#(#rhs),*)) => {
                                true #(&& #lhs == #rhs)*
                            }
                        }
                    }
                    Fields::Named(fields) => {
                        let names: Vec<&Ident> = fields
                            .named
                            .iter()
                            .filter_map(|f| f.ident.as_ref())
                            .filter(|n| !IGNORED_FIELDS.contains(&n.to_string().as_str()))
                            .collect();
                        let lhs_binds: Vec<Ident> =
                            names.iter().map(|n| format_ident!("l_{}", n)).collect();
                        let rhs_binds: Vec<Ident> =
                            names.iter().map(|n| format_ident!("r_{}", n)).collect();
                        quote! {
                            (#ident::#var_ident { #(#names: #lhs_binds,)* .. },
                             #ident::#var_ident { #(#names: #rhs_binds,)* .. }) => {
                                true #(&& #lhs_binds == #rhs_binds)*
                            }
                        }
                    }
                }
            });

            quote! {
                match (self, rhs) {
                    #(#arms)*
                    _ => false,
                }
            }
        }
        Data::Struct(DataStruct { fields, .. }) => match fields {
            Fields::Named(fields) => {
                let names: Vec<&Ident> = fields
                    .named
                    .iter()
                    .filter_map(|f| f.ident.as_ref())
                    .filter(|n| !IGNORED_FIELDS.contains(&n.to_string().as_str()))
                    .collect();
                quote! {
                    true #(&& self.#names == rhs.#names)*
                }
            }
            _ => quote! { true },
        },
        Data::Union(_) => panic!("LooseEq does not support unions"),
    };

    let gen = quote! {
        impl #impl_generics PartialEq for #ident #ty_generics #where_clause {
            fn eq(&self, rhs: &Self) -> bool {
                #body
            }
        }

        impl #impl_generics Eq for #ident #ty_generics #where_clause {}
    };

    gen.into()
}
