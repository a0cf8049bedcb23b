//! Parsing utilities for entity attributes
//!
//! This module handles the parsing of the struct-level `#[table]` and
//! `#[query_result]` attributes, the per-field mapping hints and the
//! validation of explicit table and column names.

use syn::{Attribute, Data, Error, Fields, Ident, Meta, Result, Type};

/// Validate table name and return syn::Error for better proc macro error handling
pub fn validate_table_name_syn(name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid table name '{}': {}", name, e)))
}

/// Validate column name and return syn::Error for better proc macro error handling
pub fn validate_column_name_syn(name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid column name '{}': {}", name, e)))
}

/// Explicit names are quoted with the endpoint's delimiters at runtime, so
/// they may contain spaces but never delimiter or statement characters.
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.len() > 128 {
        return Err(format!(
            "Name is too long: {} characters (max 128)",
            name.len()
        ));
    }

    if name != name.trim() {
        return Err("Name cannot start or end with whitespace".to_string());
    }

    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '"' | '\'' | '`' | '[' | ']' | ';') || c.is_control())
    {
        return Err(format!("Name contains forbidden character {:?}", c));
    }

    if name.contains("--") || name.contains("/*") || name.contains("*/") {
        return Err("Name cannot contain SQL comment sequences".to_string());
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct TableInfo {
    pub name: Option<String>,
    pub query_result: bool,
}

#[derive(Debug)]
pub struct PropertyInfo {
    pub ident: Ident,
    pub ty: Type,
    pub column: Option<String>,
    pub primary: bool,
    pub auto_increment: bool,
    pub has_default: bool,
    pub readonly: bool,
}

#[derive(Debug, Default)]
pub struct FieldInfo {
    pub properties: Vec<PropertyInfo>,
    pub snapshot_field: Option<Ident>,
}

/// Read `name = "..."` out of a list attribute such as `#[table(name = "Orders")]`
fn parse_name_argument(attr: &Attribute) -> Result<Option<String>> {
    let Meta::List(meta_list) = &attr.meta else {
        return Err(Error::new_spanned(
            attr,
            "expected a list attribute, for example #[table(name = \"Orders\")]",
        ));
    };

    let mut name = None;

    // Parse nested tokens manually, the same way for every list attribute
    let mut tokens = meta_list.tokens.clone().into_iter().peekable();

    while let Some(token) = tokens.next() {
        match token {
            proc_macro2::TokenTree::Ident(key) => {
                let key_str = key.to_string();

                let has_equals = matches!(
                    tokens.peek(),
                    Some(proc_macro2::TokenTree::Punct(punct)) if punct.as_char() == '='
                );
                if !has_equals {
                    return Err(Error::new(key.span(), format!("expected `{} = \"...\"`", key_str)));
                }
                tokens.next();

                let value = match tokens.next() {
                    Some(proc_macro2::TokenTree::Literal(lit)) => {
                        lit.to_string().trim_matches('"').to_string()
                    }
                    _ => return Err(Error::new(key.span(), "expected a string literal")),
                };

                match key_str.as_str() {
                    "name" => name = Some(value),
                    other => {
                        return Err(Error::new(key.span(), format!("unknown key `{}`", other)));
                    }
                }
            }
            // Bare `#[column("NAME")]`
            proc_macro2::TokenTree::Literal(lit) => {
                name = Some(lit.to_string().trim_matches('"').to_string());
            }
            proc_macro2::TokenTree::Punct(punct) if punct.as_char() == ',' => {}
            other => return Err(Error::new(other.span(), "unexpected token")),
        }
    }

    Ok(name)
}

pub fn parse_table_attributes(attrs: &[Attribute]) -> Result<TableInfo> {
    let mut info = TableInfo::default();

    for attr in attrs {
        if attr.path().is_ident("table") {
            let name = parse_name_argument(attr)?.ok_or_else(|| {
                Error::new_spanned(attr, "table attribute needs a name: #[table(name = \"Orders\")]")
            })?;
            validate_table_name_syn(&name, proc_macro2::Span::call_site())?;
            info.name = Some(name);
        } else if attr.path().is_ident("query_result") {
            info.query_result = true;
        }
    }

    if info.query_result && info.name.is_some() {
        return Err(Error::new(
            proc_macro2::Span::call_site(),
            "a query_result type maps result labels and cannot name a table",
        ));
    }

    Ok(info)
}

pub fn parse_field_attributes(data: &Data) -> Result<FieldInfo> {
    let fields = match data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new(
                    proc_macro2::Span::call_site(),
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut info = FieldInfo::default();

    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        if has_attribute(&field.attrs, "snapshot") || is_snapshot_type(&field.ty) {
            if info.snapshot_field.is_some() {
                return Err(Error::new(ident.span(), "only one snapshot field is allowed"));
            }
            info.snapshot_field = Some(ident);
            continue;
        }

        if has_attribute(&field.attrs, "not_column") {
            continue;
        }

        let mut column = None;
        for attr in &field.attrs {
            if attr.path().is_ident("column") {
                let name = parse_name_argument(attr)?.ok_or_else(|| {
                    Error::new_spanned(attr, "column attribute needs a name: #[column(name = \"ID\")]")
                })?;
                validate_column_name_syn(&name, ident.span())?;
                column = Some(name);
            }
        }

        info.properties.push(PropertyInfo {
            ident,
            ty: field.ty.clone(),
            column,
            primary: has_attribute(&field.attrs, "primary_key"),
            auto_increment: has_attribute(&field.attrs, "auto_increment"),
            has_default: has_attribute(&field.attrs, "has_default"),
            readonly: has_attribute(&field.attrs, "readonly"),
        });
    }

    Ok(info)
}

pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn is_snapshot_type(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Snapshot"),
        _ => false,
    }
}

/// Unit variants of a `#[derive(SqlEnum)]` type
pub fn parse_enum_variants(data: &Data) -> Result<Vec<Ident>> {
    let Data::Enum(data) = data else {
        return Err(Error::new(
            proc_macro2::Span::call_site(),
            "SqlEnum can only be derived for enums",
        ));
    };

    data.variants
        .iter()
        .map(|variant| match variant.fields {
            Fields::Unit => Ok(variant.ident.clone()),
            _ => Err(Error::new(
                variant.ident.span(),
                "SqlEnum variants cannot carry data",
            )),
        })
        .collect()
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use syn::parse_quote;

    // Helper functions for tests - these call the _syn versions but panic on error
    fn validate_table_name(name: &str) {
        if let Err(e) = validate_table_name_syn(name, proc_macro2::Span::call_site()) {
            panic!("Invalid table name: {}", e);
        }
    }

    fn validate_column_name(name: &str) {
        if let Err(e) = validate_column_name_syn(name, proc_macro2::Span::call_site()) {
            panic!("Invalid column name: {}", e);
        }
    }

    #[test]
    fn test_valid_table_names() {
        validate_table_name("Orders");
        validate_table_name("order_items");
        validate_table_name("Order Items");
        validate_table_name("sales.Orders");
        validate_table_name("T1");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_empty_name() {
        validate_table_name("");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_delimiter_in_name() {
        validate_table_name("Orders\"");
    }

    #[test]
    #[should_panic(expected = "Invalid column name")]
    fn test_padded_column() {
        validate_column_name(" ID");
    }

    #[test]
    fn test_sql_injection_prevention() {
        let malicious_names = [
            "users; DROP TABLE users; --",
            "users' OR '1'='1",
            "users/**/UNION/**/SELECT",
            "users\"; DELETE FROM users; --",
            "[users]",
        ];

        for name in malicious_names {
            let result = std::panic::catch_unwind(|| {
                validate_table_name(name);
            });
            assert!(result.is_err(), "Should panic for malicious name: {}", name);
        }
    }

    #[test]
    fn test_table_attributes() {
        let input: syn::DeriveInput = parse_quote! {
            #[table(name = "Orders")]
            struct Order { id: i64 }
        };
        let info = parse_table_attributes(&input.attrs).unwrap();
        assert_eq!(info.name.as_deref(), Some("Orders"));
        assert!(!info.query_result);

        let input: syn::DeriveInput = parse_quote! {
            #[query_result]
            struct OrderSummary { order_count: i64 }
        };
        let info = parse_table_attributes(&input.attrs).unwrap();
        assert!(info.name.is_none());
        assert!(info.query_result);
    }

    #[test]
    fn test_query_result_cannot_name_table() {
        let input: syn::DeriveInput = parse_quote! {
            #[query_result]
            #[table(name = "Orders")]
            struct OrderSummary { order_count: i64 }
        };
        assert!(parse_table_attributes(&input.attrs).is_err());
    }

    #[test]
    fn test_field_hints() {
        let input: syn::DeriveInput = parse_quote! {
            struct Order {
                #[primary_key]
                #[auto_increment]
                #[column(name = "ORDER_ID")]
                id: i64,
                name: String,
                #[has_default]
                created: Option<NaiveDateTime>,
                #[readonly]
                total: f64,
                #[not_column]
                scratch: Vec<String>,
                tracker: rowbind::store_object::Snapshot,
            }
        };
        let info = parse_field_attributes(&input.data).unwrap();

        let names: Vec<String> = info.properties.iter().map(|p| p.ident.to_string()).collect();
        assert_eq!(names, ["id", "name", "created", "total"]);
        assert_eq!(info.snapshot_field.map(|i| i.to_string()).as_deref(), Some("tracker"));

        let id = &info.properties[0];
        assert!(id.primary && id.auto_increment && !id.has_default);
        assert_eq!(id.column.as_deref(), Some("ORDER_ID"));
        assert!(info.properties[2].has_default);
        assert!(info.properties[3].readonly);
    }

    #[test]
    fn test_two_snapshots_rejected() {
        let input: syn::DeriveInput = parse_quote! {
            struct Order {
                first: Snapshot,
                #[snapshot]
                second: Snapshot,
            }
        };
        assert!(parse_field_attributes(&input.data).is_err());
    }

    #[test]
    fn test_enum_variants() {
        let input: syn::DeriveInput = parse_quote! {
            enum Status { Open, Closed }
        };
        let variants = parse_enum_variants(&input.data).unwrap();
        assert_eq!(variants.len(), 2);

        let input: syn::DeriveInput = parse_quote! {
            enum Status { Open(i32) }
        };
        assert!(parse_enum_variants(&input.data).is_err());
    }
}
