use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

/// Convenience attribute macro that adds all necessary derives for a mapped type
///
/// Usage:
/// ```ignore
/// use rowbind::prelude::*;
///
/// #[model]
/// #[table(name = "Orders")]
/// pub struct Order {
///     #[primary_key]
///     #[auto_increment]
///     pub id: i64,
///     pub name: String,
/// }
/// ```
pub fn model_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let name = &input.ident;
    let attrs = &input.attrs;
    let vis = &input.vis;
    let generics = &input.generics;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(name, "model can only be used on structs")
                .to_compile_error()
                .into();
        }
    };

    // Sessions build fresh objects through Default when fetching by key
    let expanded = quote! {
        #[derive(Debug, Clone, Default, ::rowbind::Entity)]
        #(#attrs)*
        #vis struct #name #generics #fields
    };

    TokenStream::from(expanded)
}
