//! Table name resolution
//!
//! Without an explicit hint, a type's table is found by generating naming
//! convention guesses and requiring exactly one of the catalog's tables to
//! match them, ignoring case.

use indexmap::IndexSet;

use crate::errors::MappingError;

/// Naming-convention candidates for `type_name`, in priority order:
/// bare name, plural, the title-cased form of both, then their
/// underscore-joined forms
pub fn table_name_guesses(type_name: &str) -> IndexSet<String> {
    let plural = pluralize(type_name);
    let titled = camel_to_title_case(type_name);
    let titled_plural = camel_to_title_case(&plural);

    let mut guesses = IndexSet::new();
    guesses.insert(type_name.to_string());
    guesses.insert(plural);
    guesses.insert(titled.clone());
    guesses.insert(titled_plural.clone());
    guesses.insert(titled.replace(' ', "_"));
    guesses.insert(titled_plural.replace(' ', "_"));
    guesses
}

/// Resolve the table for a type against the catalog's table names
pub fn resolve_table_name(
    type_name: &str,
    hint: Option<&str>,
    catalog_tables: &[String],
) -> Result<String, MappingError> {
    if let Some(table) = hint {
        return Ok(table.to_string());
    }

    let guesses = table_name_guesses(type_name);
    let matches: IndexSet<&String> = guesses
        .iter()
        .flat_map(|guess| {
            catalog_tables
                .iter()
                .filter(move |table| table.eq_ignore_ascii_case(guess))
        })
        .collect();

    if matches.len() == 1 {
        if let Some(table) = matches.first() {
            return Ok((*table).clone());
        }
    }

    Err(MappingError::AmbiguousMapping {
        type_name: type_name.to_string(),
        candidates: guesses.into_iter().collect(),
        matches: matches.into_iter().cloned().collect(),
    })
}

fn pluralize(name: &str) -> String {
    match name.strip_suffix('y') {
        Some(stem) => format!("{}ies", stem),
        None => format!("{}s", name),
    }
}

fn camel_to_title_case(name: &str) -> String {
    let mut titled = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if c.is_uppercase() {
            if let Some(p) = previous {
                if !p.is_uppercase() && !p.is_whitespace() {
                    titled.push(' ');
                }
            }
        }
        titled.push(c);
        previous = Some(c);
    }
    titled
}
