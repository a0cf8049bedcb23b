//! Snapshot-based change tracking
//!
//! A tracked entity embeds a [`Snapshot`]. After every successful read the
//! mapped property values are captured; an update then only touches the
//! properties whose current value differs from the captured one.

use indexmap::IndexMap;
use type_mapping::Value;

use crate::traits::{Entity, EntityDescriptor};

/// Property values captured at the most recent read
///
/// Snapshots never take part in cloning or equality: a cloned entity starts
/// without one, so every property counts as changed until it is read again.
#[derive(Debug, Default)]
pub struct Snapshot {
    original: Option<IndexMap<String, Value>>,
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        Snapshot::default()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Snapshot {
    pub fn is_captured(&self) -> bool {
        self.original.is_some()
    }

    /// Value captured for `property` (case-insensitive)
    pub fn original_value(&self, property: &str) -> Option<&Value> {
        self.original.as_ref().and_then(|values| {
            values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(property))
                .map(|(_, value)| value)
        })
    }

    pub fn clear(&mut self) {
        self.original = None;
    }

    fn capture(&mut self, values: IndexMap<String, Value>) {
        self.original = Some(values);
    }
}

/// Save the current mapped property values as the object's snapshot
pub fn save_read_state<T: Entity>(object: &mut T, descriptor: &EntityDescriptor<T>) {
    if !T::is_change_tracked() {
        return;
    }

    let values: IndexMap<String, Value> = descriptor
        .mappable()
        .filter_map(|index| descriptor.property(index))
        .map(|property| (property.name.to_string(), property.read(object)))
        .collect();

    if let Some(snapshot) = object.snapshot_mut() {
        snapshot.capture(values);
    }
}

/// Positions of mapped properties whose value differs from the snapshot
///
/// Both-null and equal non-null values are unchanged. Without a captured
/// snapshot every mapped property is reported.
pub fn changed_properties<T: Entity>(object: &T, descriptor: &EntityDescriptor<T>) -> Vec<usize> {
    let snapshot = object.snapshot().filter(|snapshot| snapshot.is_captured());

    descriptor
        .mappable()
        .filter(|index| {
            let Some(snapshot) = snapshot else {
                return true;
            };
            let Some(property) = descriptor.property(*index) else {
                return false;
            };
            match snapshot.original_value(property.name) {
                Some(original) => *original != property.read(object),
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ColumnHints, PropertyDescriptor};
    use type_mapping::{FieldType, PropertyType};

    #[derive(Debug, Clone, Default)]
    struct Customer {
        name: String,
        region: Option<String>,
        snapshot: Snapshot,
    }

    impl Entity for Customer {
        fn type_name() -> &'static str {
            "Customer"
        }

        fn is_change_tracked() -> bool {
            true
        }

        fn describe() -> EntityDescriptor<Self> {
            EntityDescriptor::new(
                "Customer",
                vec![
                    PropertyDescriptor {
                        name: "name",
                        property_type: PropertyType::String,
                        nullable: false,
                        reader: Some(|obj: &Customer| obj.name.to_value()),
                        writer: Some(|obj: &mut Customer, v| String::assign(&mut obj.name, v)),
                        hints: ColumnHints::default(),
                    },
                    PropertyDescriptor {
                        name: "region",
                        property_type: PropertyType::String,
                        nullable: true,
                        reader: Some(|obj: &Customer| obj.region.to_value()),
                        writer: Some(|obj: &mut Customer, v| Option::<String>::assign(&mut obj.region, v)),
                        hints: ColumnHints::default(),
                    },
                ],
            )
        }

        fn snapshot(&self) -> Option<&Snapshot> {
            Some(&self.snapshot)
        }

        fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
            Some(&mut self.snapshot)
        }
    }

    #[test]
    fn test_without_snapshot_everything_changed() {
        let descriptor = Customer::describe();
        let customer = Customer::default();
        assert_eq!(changed_properties(&customer, &descriptor), vec![0, 1]);
    }

    #[test]
    fn test_nulls_compare_equal() {
        let descriptor = Customer::describe();
        let mut customer = Customer {
            name: "Ada".into(),
            ..Customer::default()
        };
        save_read_state(&mut customer, &descriptor);
        assert!(changed_properties(&customer, &descriptor).is_empty());

        customer.region = Some("North".into());
        assert_eq!(changed_properties(&customer, &descriptor), vec![1]);

        customer.region = None;
        customer.name = "Grace".into();
        assert_eq!(changed_properties(&customer, &descriptor), vec![0]);
    }

    #[test]
    fn test_clone_drops_snapshot() {
        let descriptor = Customer::describe();
        let mut customer = Customer::default();
        save_read_state(&mut customer, &descriptor);
        assert!(customer.snapshot.is_captured());

        let copy = customer.clone();
        assert!(!copy.snapshot.is_captured());
        assert_eq!(changed_properties(&copy, &descriptor).len(), 2);
    }
}
