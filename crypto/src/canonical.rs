//! Canonical JSON: the only byte encoding that is ever signed or hashed.
//!
//! Values go through `serde_json::Value` and every object is rebuilt with its
//! keys in sorted order, so struct field order and map insertion order cannot
//! change the output bytes. The rebuild keeps this true even when
//! serde_json's `preserve_order` feature is enabled somewhere in the build.

use crate::error::CryptoError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Deterministic JSON bytes for `value`.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    let tree = serde_json::to_value(value).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    serde_json::to_vec(&sorted(tree)).map_err(|e| CryptoError::Encoding(e.to_string()))
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key, sorted(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Forward {
        sender: String,
        recipient: String,
        value: u64,
    }

    #[derive(Serialize)]
    struct Backward {
        value: u64,
        recipient: String,
        sender: String,
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = Forward {
            sender: "s".into(),
            recipient: "r".into(),
            value: 3,
        };
        let b = Backward {
            value: 3,
            recipient: "r".into(),
            sender: "s".into(),
        };
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn keys_are_sorted() {
        let bytes = canonical_json(&Backward {
            value: 1,
            recipient: "r".into(),
            sender: "s".into(),
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"recipient":"r","sender":"s","value":1}"#
        );
    }

    #[derive(Serialize)]
    struct Envelope {
        zeta: Backward,
        alpha: Vec<Backward>,
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let inner = || Backward {
            value: 2,
            recipient: "r".into(),
            sender: "s".into(),
        };
        let bytes = canonical_json(&Envelope {
            zeta: inner(),
            alpha: vec![inner()],
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":[{"recipient":"r","sender":"s","value":2}],"zeta":{"recipient":"r","sender":"s","value":2}}"#
        );
    }

    proptest! {
        #[test]
        fn map_insertion_order_is_irrelevant(entries in prop::collection::vec(("[a-z]{1,6}", 0u64..1000), 0..12)) {
            let forward: HashMap<String, u64> = entries.iter().cloned().collect();
            let mut reversed_entries = entries.clone();
            reversed_entries.reverse();
            // Later duplicates win in both maps.
            let mut reversed: HashMap<String, u64> = HashMap::new();
            for (k, _) in &reversed_entries {
                reversed.insert(k.clone(), forward[k]);
            }
            prop_assert_eq!(canonical_json(&forward).unwrap(), canonical_json(&reversed).unwrap());
        }
    }
}
