//! Code generation for `Entity` and `SqlEnum` implementations
//!
//! Generated code refers to the runtime through `::rowbind`, so user crates
//! only depend on the facade crate.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident};

use crate::parsing::{FieldInfo, PropertyInfo, TableInfo};

fn optional_str(value: Option<&str>) -> TokenStream {
    match value {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    }
}

/// A flag attribute is a hint when present; absent flags are left to the catalog
fn flag_hint(present: bool) -> TokenStream {
    if present {
        quote! { ::core::option::Option::Some(true) }
    } else {
        quote! { ::core::option::Option::None }
    }
}

fn generate_property(property: &PropertyInfo) -> TokenStream {
    let ident = &property.ident;
    let ty = &property.ty;
    let name = ident.to_string();
    let column = optional_str(property.column.as_deref());
    let primary = flag_hint(property.primary);
    let auto_increment = flag_hint(property.auto_increment);
    let has_default = flag_hint(property.has_default);

    let writer = if property.readonly {
        quote! { ::core::option::Option::None }
    } else {
        quote! {
            ::core::option::Option::Some(
                (|object: &mut Self, value: ::rowbind::type_mapping::Value| {
                    <#ty as ::rowbind::type_mapping::FieldType>::assign(&mut object.#ident, value)
                }) as ::rowbind::store_object::Writer<Self>
            )
        }
    };

    quote! {
        ::rowbind::store_object::PropertyDescriptor {
            name: #name,
            property_type: <#ty as ::rowbind::type_mapping::FieldType>::PROPERTY_TYPE,
            nullable: <#ty as ::rowbind::type_mapping::FieldType>::NULLABLE,
            reader: ::core::option::Option::Some(
                (|object: &Self| {
                    ::rowbind::type_mapping::FieldType::to_value(&object.#ident)
                }) as ::rowbind::store_object::Reader<Self>
            ),
            writer: #writer,
            hints: ::rowbind::store_object::ColumnHints {
                column: #column,
                primary: #primary,
                auto_increment: #auto_increment,
                has_default: #has_default,
                not_column: false,
            },
        }
    }
}

pub fn generate_entity_impl(input: &DeriveInput, table_info: &TableInfo, field_info: &FieldInfo) -> TokenStream {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table_hint = optional_str(table_info.name.as_deref());
    let query_result = table_info.query_result;
    let change_tracked = field_info.snapshot_field.is_some();
    let properties: Vec<TokenStream> = field_info.properties.iter().map(generate_property).collect();

    let snapshot_methods = match &field_info.snapshot_field {
        Some(field) => quote! {
            fn snapshot(&self) -> ::core::option::Option<&::rowbind::store_object::Snapshot> {
                ::core::option::Option::Some(&self.#field)
            }

            fn snapshot_mut(&mut self) -> ::core::option::Option<&mut ::rowbind::store_object::Snapshot> {
                ::core::option::Option::Some(&mut self.#field)
            }
        },
        None => quote! {},
    };

    quote! {
        impl #impl_generics ::rowbind::store_object::Entity for #name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn table_hint() -> ::core::option::Option<&'static str> {
                #table_hint
            }

            fn is_query_result() -> bool {
                #query_result
            }

            fn is_change_tracked() -> bool {
                #change_tracked
            }

            fn describe() -> ::rowbind::store_object::EntityDescriptor<Self> {
                ::rowbind::store_object::EntityDescriptor::new(
                    #type_name,
                    ::std::vec![#(#properties),*],
                )
            }

            #snapshot_methods
        }
    }
}

pub fn generate_sql_enum_impl(name: &Ident, variants: &[Ident]) -> TokenStream {
    let labels: Vec<String> = variants.iter().map(|v| v.to_string()).collect();

    quote! {
        impl ::rowbind::type_mapping::FieldType for #name {
            const PROPERTY_TYPE: ::rowbind::type_mapping::PropertyType =
                ::rowbind::type_mapping::PropertyType::Enum(&[#(#labels),*]);

            fn to_value(&self) -> ::rowbind::type_mapping::Value {
                let label = match self {
                    #(Self::#variants => #labels,)*
                };
                ::rowbind::type_mapping::Value::Enum(::std::string::String::from(label))
            }

            fn from_value(
                value: ::rowbind::type_mapping::Value,
            ) -> ::core::result::Result<Self, ::rowbind::type_mapping::ConversionError> {
                match value {
                    ::rowbind::type_mapping::Value::Enum(label)
                    | ::rowbind::type_mapping::Value::Text(label) => match label.as_str() {
                        #(#labels => ::core::result::Result::Ok(Self::#variants),)*
                        _ => ::core::result::Result::Err(
                            ::rowbind::type_mapping::ConversionError::UnknownVariant {
                                value: label,
                                target: Self::PROPERTY_TYPE,
                            },
                        ),
                    },
                    other => ::core::result::Result::Err(
                        ::rowbind::type_mapping::ConversionError::TypeMismatch {
                            expected: Self::PROPERTY_TYPE,
                            found: other.kind_name(),
                        },
                    ),
                }
            }
        }
    }
}
