use std::collections::BTreeMap;

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Opaque record content preserved from the source document.
///
/// Holds every field of a record that the engine does not interpret, exactly
/// as authored. Content participates in fingerprints through a canonical
/// encoding, so reordering keys in a document never changes the fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(BTreeMap<String, Value>);

impl Content {
    /// Creates content from a map of uninterpreted fields.
    #[must_use]
    pub const fn new(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }

    /// True when the record carries no uninterpreted fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the uninterpreted fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Canonical form of the content for fingerprinting.
    pub(crate) fn canonical(&self) -> CanonicalValue {
        let mapping = self
            .0
            .iter()
            .map(|(key, value)| (CanonicalValue::Text(key.clone()), CanonicalValue::from(value)))
            .collect();
        CanonicalValue::Mapping(mapping)
    }
}

/// A YAML value reduced to a deterministic, byte-serializable form.
///
/// Mappings are re-keyed into sorted order at every nesting level and floats
/// are carried as their shortest decimal rendering, so structurally equal
/// documents always encode to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, BorshSerialize)]
pub(crate) enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(String),
    Text(String),
    Sequence(Vec<CanonicalValue>),
    Mapping(BTreeMap<CanonicalValue, CanonicalValue>),
    Tagged(String, Box<CanonicalValue>),
}

impl From<&Value> for CanonicalValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number
                .as_i64()
                .map_or_else(|| Self::Float(number.to_string()), Self::Int),
            Value::String(text) => Self::Text(text.clone()),
            Value::Sequence(items) => Self::Sequence(items.iter().map(Self::from).collect()),
            Value::Mapping(mapping) => Self::Mapping(
                mapping
                    .iter()
                    .map(|(key, value)| (Self::from(key), Self::from(value)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::Tagged(
                tagged.tag.to_string(),
                Box::new(Self::from(&tagged.value)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(yaml: &str) -> Content {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn encoded(content: &Content) -> Vec<u8> {
        borsh::to_vec(&content.canonical()).unwrap()
    }

    #[test]
    fn key_order_does_not_change_the_encoding() {
        let a = content("steps:\n  - Turn key\nexpected: Engine starts\n");
        let b = content("expected: Engine starts\nsteps:\n  - Turn key\n");
        assert_eq!(encoded(&a), encoded(&b));
    }

    #[test]
    fn nested_key_order_does_not_change_the_encoding() {
        let a = content("instructions:\n  steps:\n    - step: Turn key\n  duration: 5\n");
        let b = content("instructions:\n  duration: 5\n  steps:\n    - step: Turn key\n");
        assert_eq!(encoded(&a), encoded(&b));
    }

    #[test]
    fn sequence_order_is_significant() {
        let a = content("steps:\n  - first\n  - second\n");
        let b = content("steps:\n  - second\n  - first\n");
        assert_ne!(encoded(&a), encoded(&b));
    }

    #[test]
    fn value_edits_change_the_encoding() {
        let a = content("expected: Engine starts\n");
        let b = content("expected: Engine stops\n");
        assert_ne!(encoded(&a), encoded(&b));
    }

    #[test]
    fn scalar_types_are_distinguished() {
        let int = content("value: 1\n");
        let text = content("value: '1'\n");
        let boolean = content("value: true\n");
        assert_ne!(encoded(&int), encoded(&text));
        assert_ne!(encoded(&int), encoded(&boolean));
    }

    #[test]
    fn floats_encode_deterministically() {
        let a = content("tolerance: 0.5\n");
        let b = content("tolerance: 0.5\n");
        assert_eq!(encoded(&a), encoded(&b));
    }

    #[test]
    fn empty_content_is_empty() {
        assert!(Content::default().is_empty());
        assert!(!content("note: text\n").is_empty());
    }
}
