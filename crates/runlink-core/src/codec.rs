//! Value codec: partitions a [`KeyValueMap`] into per-type batches for
//! transfer across the engine boundary.
//!
//! Every key of the input lands in exactly one batch, and inside a batch
//! `keys[i]` always pairs with `values[i]`. Empty batches are never sent.

use crate::models::{KeyValueMap, Value};

/// Keys and values of a single type, paired by index.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<'a, T> {
    pub keys: Vec<&'a str>,
    pub values: Vec<T>,
}

impl<T> Batch<'_, T> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The three per-type batches of one map. Borrowed from the map; the engine
/// copies what it needs during the add/log call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batches<'a> {
    pub ints: Batch<'a, i64>,
    pub doubles: Batch<'a, f64>,
    pub texts: Batch<'a, &'a str>,
}

impl<'a> Batches<'a> {
    pub fn ints(&self) -> Option<&Batch<'a, i64>> {
        (!self.ints.is_empty()).then_some(&self.ints)
    }

    pub fn doubles(&self) -> Option<&Batch<'a, f64>> {
        (!self.doubles.is_empty()).then_some(&self.doubles)
    }

    pub fn texts(&self) -> Option<&Batch<'a, &'a str>> {
        (!self.texts.is_empty()).then_some(&self.texts)
    }

    /// Total number of entries across all batches.
    pub fn len(&self) -> usize {
        self.ints.len() + self.doubles.len() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `map` into integer, double and text batches.
pub fn partition(map: &KeyValueMap) -> Batches<'_> {
    let mut out = Batches {
        ints: Batch::new(),
        doubles: Batch::new(),
        texts: Batch::new(),
    };
    for (key, value) in map {
        match value {
            Value::Int(v) => {
                out.ints.keys.push(key);
                out.ints.values.push(*v);
            }
            Value::Double(v) => {
                out.doubles.keys.push(key);
                out.doubles.values.push(*v);
            }
            Value::Text(v) => {
                out.texts.keys.push(key);
                out.texts.values.push(v.as_str());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn sample() -> KeyValueMap {
        KeyValueMap::from_pairs([
            ("param1", Value::Int(4)),
            ("param2", Value::Double(4.2)),
            ("param3", Value::Text("x".into())),
            ("param4", Value::Int(-7)),
        ])
        .unwrap()
    }

    #[test]
    fn test_partition_keeps_pairing() {
        let map = sample();
        let b = partition(&map);
        assert_eq!(b.ints.keys, vec!["param1", "param4"]);
        assert_eq!(b.ints.values, vec![4, -7]);
        assert_eq!(b.doubles.keys, vec!["param2"]);
        assert_eq!(b.doubles.values, vec![4.2]);
        assert_eq!(b.texts.keys, vec!["param3"]);
        assert_eq!(b.texts.values, vec!["x"]);
    }

    #[test]
    fn test_partition_covers_every_key_once() {
        let map = sample();
        let b = partition(&map);
        let mut seen: Vec<&str> = Vec::new();
        seen.extend(&b.ints.keys);
        seen.extend(&b.doubles.keys);
        seen.extend(&b.texts.keys);
        assert_eq!(seen.len(), map.len());
        let unique: BTreeSet<&str> = seen.into_iter().collect();
        let expected: BTreeSet<&str> = map.keys().collect();
        assert_eq!(unique, expected);
    }

    #[test]
    fn test_empty_batches_are_omitted() {
        let map = KeyValueMap::from_pairs([("loss", 0.5)]).unwrap();
        let b = partition(&map);
        assert!(b.ints().is_none());
        assert!(b.texts().is_none());
        assert_eq!(b.doubles().map(Batch::len), Some(1));

        let empty = KeyValueMap::new();
        assert!(partition(&empty).is_empty());
    }

    fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            (-1.0e12..1.0e12f64).prop_map(Value::Double),
            "[ -~]{0,12}".prop_map(Value::Text),
        ]
    }

    fn entry_maps() -> impl Strategy<Value = BTreeMap<String, Value>> {
        prop::collection::btree_map("[a-z_]{1,8}", value(), 0..24)
    }

    proptest! {
        #[test]
        fn test_partition_pairs_every_key_exactly_once(entries in entry_maps()) {
            let map = KeyValueMap::from_pairs(entries.clone()).unwrap();
            let b = partition(&map);
            prop_assert_eq!(b.len(), entries.len());
            prop_assert_eq!(b.ints.keys.len(), b.ints.values.len());
            prop_assert_eq!(b.doubles.keys.len(), b.doubles.values.len());
            prop_assert_eq!(b.texts.keys.len(), b.texts.values.len());

            let mut seen = BTreeSet::new();
            for (k, v) in b.ints.keys.iter().zip(&b.ints.values) {
                prop_assert!(seen.insert(*k));
                prop_assert_eq!(entries.get(*k), Some(&Value::Int(*v)));
            }
            for (k, v) in b.doubles.keys.iter().zip(&b.doubles.values) {
                prop_assert!(seen.insert(*k));
                prop_assert_eq!(entries.get(*k), Some(&Value::Double(*v)));
            }
            for (k, v) in b.texts.keys.iter().zip(&b.texts.values) {
                prop_assert!(seen.insert(*k));
                prop_assert_eq!(entries.get(*k), Some(&Value::Text(v.to_string())));
            }
            prop_assert_eq!(seen.len(), entries.len());

            prop_assert_eq!(b.ints().is_some(), !b.ints.is_empty());
            prop_assert_eq!(b.doubles().is_some(), !b.doubles.is_empty());
            prop_assert_eq!(b.texts().is_some(), !b.texts.is_empty());
        }
    }
}
