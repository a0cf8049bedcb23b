//! Procedural macros for describing mapped types
//!
//! This crate provides the `#[model]` macro and the `Entity` and `SqlEnum`
//! derives. The derives only describe a type: property order, accessors and
//! declarative hints. Table and column resolution happens at runtime against
//! the live catalog.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod entity_impl;
mod model_macro;
mod parsing;

use entity_impl::{generate_entity_impl, generate_sql_enum_impl};
use model_macro::model_attribute;
use parsing::{parse_enum_variants, parse_field_attributes, parse_table_attributes};

/// Derive macro for the `Entity` trait
///
/// Struct attributes:
/// - `#[table(name = "...")]` names the table explicitly
/// - `#[query_result]` maps result labels instead of a table
///
/// Field attributes:
/// - `#[primary_key]`, `#[auto_increment]`, `#[has_default]` hint column flags
/// - `#[column(name = "...")]` binds the field to a column by name
/// - `#[readonly]` reads the field but never writes it back, which keeps it
///   out of mapping
/// - `#[not_column]` leaves the field out entirely
/// - `#[snapshot]` (or any field of type `Snapshot`) enables change tracking
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Entity)]
/// #[table(name = "Orders")]
/// pub struct Order {
///     #[primary_key]
///     #[auto_increment]
///     pub id: i64,
///
///     #[column(name = "NAME")]
///     pub customer: String,
///
///     #[has_default]
///     pub created: Option<NaiveDateTime>,
///
///     pub snapshot: Snapshot,
/// }
/// ```
#[proc_macro_derive(
    Entity,
    attributes(
        table,
        query_result,
        primary_key,
        auto_increment,
        has_default,
        column,
        not_column,
        readonly,
        snapshot
    )
)]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let table_info = match parse_table_attributes(&input.attrs) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let field_info = match parse_field_attributes(&input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_entity_impl(&input, &table_info, &field_info).into()
}

/// Derive `FieldType` for a unit enum stored as its variant names
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, Default, PartialEq, SqlEnum)]
/// pub enum Status {
///     #[default]
///     Open,
///     Closed,
/// }
/// ```
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match parse_enum_variants(&input.data) {
        Ok(variants) => generate_sql_enum_impl(&input.ident, &variants).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Convenience attribute macro that adds `Debug`, `Clone`, `Default` and
/// `Entity` derives to a struct
#[proc_macro_attribute]
pub fn model(attr: TokenStream, item: TokenStream) -> TokenStream {
    model_attribute(attr, item)
}
