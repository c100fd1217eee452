use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, GenericParam, Generics};

/// Derives `rebind::bind::FromRaw` for single-field tuple structs, so
/// domain newtypes can be built straight from a bound parameter's raw
/// text.
#[proc_macro_derive(FromRaw)]
pub fn derive_from_raw(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    // Parse the input tokens into a syntax tree.
    let input = parse_macro_input!(input as DeriveInput);

    // Used in the quasi-quotation below as `#name`.
    let name = input.ident;

    // Add a bound `T: FromRaw` to every type parameter T.
    let generics = add_trait_bounds(input.generics);
    let (impl_generics, _, _) = generics.split_for_impl();

    // Expression delegating to the inner field's FromRaw.
    let call = call_from_raw(&input.data);

    let expanded = quote! {
        impl #impl_generics rebind::bind::FromRaw for #name {
            fn from_raw(raw: String) -> anyhow::Result<Self> {
                #call
            }
        }
    };

    proc_macro::TokenStream::from(expanded)
}

fn add_trait_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ref mut type_param) = *param {
            type_param.bounds.push(parse_quote!(rebind::bind::FromRaw));
        }
    }
    generics
}

fn call_from_raw(data: &Data) -> TokenStream {
    match *data {
        Data::Struct(ref data) => {
            match data.fields {
                syn::Fields::Unnamed(ref fields) => {
                    // Expand to an expression delegating to the single
                    // field:
                    //
                    // Ok(Self(<#ty>::from_raw(raw)?))
                    if fields.unnamed.len() != 1 {
                        panic!("only single tuple value allowed");
                    }

                    let field = fields.unnamed.iter().next().unwrap().clone();
                    let ty = field.ty.clone();

                    quote_spanned!(field.span() =>
                        Ok(Self(<#ty as rebind::bind::FromRaw>::from_raw(raw)?))
                    )
                }
                syn::Fields::Unit | syn::Fields::Named(_) => unimplemented!(),
            }
        }
        Data::Enum(_) | Data::Union(_) => unimplemented!(),
    }
}
