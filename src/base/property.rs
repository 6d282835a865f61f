/// Property descriptors
use serde_json::Value;

use super::{DerivedKind, ResourceKind};

/// Static property table of a resource kind
///
/// The table drives population, coercion on read, write permission and the
/// dirty check; descriptors carry no behavior of their own.
pub type PropertyTable = &'static [(&'static str, Property)];

/// The child kind a derived-collection property expands into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedClass {
    /// Name of the child kind
    pub kind: &'static str,
    /// Collection path appended to the parent's endpoint
    pub url_path: &'static str,
}

/// Declares how one attribute behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Property {
    identifier: bool,
    mutable: bool,
    volatile: bool,
    is_datetime: bool,
    unordered: bool,
    slug_relationship: Option<&'static str>,
    derived_class: Option<DerivedClass>,
}

impl Property {
    pub const fn new() -> Self {
        Self {
            identifier: false,
            mutable: false,
            volatile: false,
            is_datetime: false,
            unordered: false,
            slug_relationship: None,
            derived_class: None,
        }
    }

    /// Part of the URL; never fetched, never written
    pub const fn identifier(mut self) -> Self {
        assert!(!self.mutable, "an identifier property cannot be mutable");
        self.identifier = true;
        self
    }

    pub const fn mutable(mut self) -> Self {
        assert!(!self.identifier, "an identifier property cannot be mutable");
        self.mutable = true;
        self
    }

    /// Re-fetched when the snapshot is older than the client's refresh interval
    pub const fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub const fn datetime(mut self) -> Self {
        self.is_datetime = true;
        self
    }

    /// List value whose element order does not matter for change detection
    pub const fn unordered(mut self) -> Self {
        self.unordered = true;
        self
    }

    /// Raw value is a slug naming an `R`
    pub const fn slug<R: ResourceKind>(mut self) -> Self {
        self.slug_relationship = Some(R::NAME);
        self
    }

    /// Value is the collection of `D` objects living under this one
    pub const fn derived<D: DerivedKind>(mut self) -> Self {
        self.derived_class = Some(DerivedClass {
            kind: D::NAME,
            url_path: D::DERIVED_URL_PATH,
        });
        self
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    pub fn is_datetime(&self) -> bool {
        self.is_datetime
    }

    pub fn is_unordered(&self) -> bool {
        self.unordered
    }

    pub fn slug_relationship(&self) -> Option<&'static str> {
        self.slug_relationship
    }

    pub fn derived_class(&self) -> Option<DerivedClass> {
        self.derived_class
    }

    /// Whether `a` and `b` count as the same value for this property
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(left), Value::Array(right)) if self.unordered => {
                if left.len() != right.len() {
                    return false;
                }
                let mut left: Vec<String> = left.iter().map(Value::to_string).collect();
                let mut right: Vec<String> = right.iter().map(Value::to_string).collect();
                left.sort();
                right.sort();
                left == right
            }
            _ => a == b,
        }
    }
}

/// Look up `name` in a property table, returning the table's own name with it
pub fn find_property(table: PropertyTable, name: &str) -> Option<(&'static str, Property)> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("label", Property::new().mutable()),
        ("tags", Property::new().mutable().unordered()),
        ("created", Property::new().datetime()),
    ];

    #[test]
    fn test_lookup() {
        assert!(find_property(TABLE, "id").unwrap().1.is_identifier());
        assert!(find_property(TABLE, "label").unwrap().1.is_mutable());
        assert!(find_property(TABLE, "created").unwrap().1.is_datetime());
        assert!(find_property(TABLE, "nope").is_none());
    }

    #[test]
    fn test_unordered_comparison() {
        let (_, tags) = find_property(TABLE, "tags").unwrap();
        assert!(tags.values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
        assert!(!tags.values_equal(&json!(["a", "b"]), &json!(["a", "a"])));
        assert!(!tags.values_equal(&json!(["a"]), &json!(["a", "b"])));
    }

    #[test]
    fn test_ordered_comparison() {
        let (_, label) = find_property(TABLE, "label").unwrap();
        assert!(!label.values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
        assert!(label.values_equal(&json!("x"), &json!("x")));
    }
}
