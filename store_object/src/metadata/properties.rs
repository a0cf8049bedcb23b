//! Column to property matching
//!
//! A column label matches a property when both normalise to the same text
//! (lowercase, without underscores, whitespace or the driver's extra
//! identifier characters), or when the property's column hint names the
//! label exactly, ignoring case.

use indexmap::IndexMap;
use type_mapping::debug_log;

use crate::traits::EntityDescriptor;

pub fn normalize_column(label: &str, extra_name_characters: &str) -> String {
    label
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace() && !extra_name_characters.contains(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize_property(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Position of the mappable property bound to `label`
pub fn match_property<T>(
    descriptor: &EntityDescriptor<T>,
    label: &str,
    extra_name_characters: &str,
) -> Option<usize> {
    let normalized = normalize_column(label, extra_name_characters);
    descriptor.mappable().find(|index| {
        descriptor.property(*index).is_some_and(|property| {
            match property.hints.column {
                Some(column) => column.eq_ignore_ascii_case(label),
                None => normalize_property(property.name) == normalized,
            }
        })
    })
}

/// Bind result labels to properties, in label order; unmatched labels are skipped
pub fn map_labels<'a, T>(
    descriptor: &EntityDescriptor<T>,
    labels: impl IntoIterator<Item = &'a str>,
    extra_name_characters: &str,
) -> IndexMap<String, usize> {
    let mut bindings = IndexMap::new();
    for label in labels {
        match match_property(descriptor, label, extra_name_characters) {
            Some(index) => {
                bindings.insert(label.to_string(), index);
            }
            None => {
                debug_log!(
                    "Property not found for column: {} type: {}",
                    label,
                    descriptor.type_name()
                );
            }
        }
    }
    bindings
}
