use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::ArtTree;

/// Simple model implementation using BTreeMap for comparison.
///
/// Mirrors the tree's duplicate policy: inserting a present key is ignored.
#[derive(Default)]
struct Model {
    map: BTreeMap<Vec<u8>, u64>,
}

impl Model {
    fn insert(&mut self, key: Vec<u8>, value: u64) {
        self.map.entry(key).or_insert(value);
    }

    fn get(&self, key: &[u8]) -> Option<&u64> {
        self.map.get(key)
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        self.map.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Actions to test against both implementations
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Search(Key),
    Delete(Key),
}

/// Wrapper for key generation with custom strategy.
///
/// Generated keys never contain a zero byte, so the tree's trailing
/// sentinel keeps the stored key set prefix-free and the BTreeMap model
/// orders keys the same way the tree does.
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

/// Wrapper for key-value pair
#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: u64,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Empty key
            Just(Key(vec![])),
            // Short keys (1-4 bytes)
            prop::collection::vec(1u8..=255, 1..4).prop_map(Key),
            // Medium keys (4-64 bytes)
            prop::collection::vec(1u8..=255, 4..64).prop_map(Key),
            // Keys with natural delimiters to exercise prefix compression
            "[a-z]{4,8}/[a-z]{1,8}".prop_map(|s| Key(s.into_bytes())),
            "[a-z]{4,8}:[a-z]{1,8}".prop_map(|s| Key(s.into_bytes())),
            // Keys sharing a prefix longer than the stored ten-byte cap,
            // to exercise pessimistic path recovery
            "[a-z]{1,4}".prop_map(|s| {
                let mut key = b"sharedprefixpastthecap/".to_vec();
                key.extend_from_slice(s.as_bytes());
                Key(key)
            }),
            // Keys with shared short prefixes
            "[a-z]{4,8}".prop_map(|prefix| {
                let mut key = prefix.into_bytes();
                key.extend_from_slice(b"/suffix");
                Key(key)
            }),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), any::<u64>())
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

/// Test harness that executes actions on both ArtTree and Model
#[derive(Default)]
struct Test {
    tree: ArtTree<u64>,
    model: Model,
}

impl Test {
    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0;
                self.tree.insert(&key, kv.value);
                self.model.insert(key, kv.value);
            }
            Action::Search(key) => {
                let key_bytes = key.0;
                let tree_result = self.tree.search(&key_bytes);
                let model_result = self.model.get(&key_bytes);
                assert_eq!(
                    tree_result, model_result,
                    "Search mismatch: key={:?}, tree_result={:?}, model_result={:?}",
                    key_bytes, tree_result, model_result
                );
            }
            Action::Delete(key) => {
                let key_bytes = key.0;
                let tree_result = self.tree.delete(&key_bytes);
                let model_result = self.model.remove(&key_bytes);
                assert_eq!(
                    tree_result, model_result,
                    "Delete mismatch: key={:?}, tree_result={:?}, model_result={:?}",
                    key_bytes, tree_result, model_result
                );
            }
        }
        // Always verify size matches
        assert_eq!(
            self.tree.size(),
            self.model.len(),
            "Size mismatch after action: tree={}, model={}",
            self.tree.size(),
            self.model.len()
        );
        assert_eq!(
            self.tree.is_empty(),
            self.model.is_empty(),
            "is_empty mismatch: tree={}, model={}",
            self.tree.is_empty(),
            self.model.is_empty()
        );
    }

    /// The key the tree stores for a model key: the sentinel is appended
    /// because no generated key contains a zero byte.
    fn stored_key(key: &[u8]) -> Vec<u8> {
        let mut stored = key.to_vec();
        stored.push(0);
        stored
    }

    /// End-of-run checks: structure, traversal order, minimum and maximum.
    fn finish(&self) {
        self.tree.check_invariants();

        let mut visited = Vec::new();
        self.tree.each(|node| {
            if let Some(key) = node.key() {
                visited.push(key.to_vec());
            }
        });
        let expected: Vec<Vec<u8>> = self.model.map.keys().map(|k| Self::stored_key(k)).collect();
        assert_eq!(visited, expected, "traversal must yield keys in order");

        for (key, value) in &self.model.map {
            assert_eq!(self.tree.search(key), Some(value));
        }

        let model_min = self
            .model
            .map
            .first_key_value()
            .map(|(k, v)| (Self::stored_key(k), *v));
        let tree_min = self.tree.minimum().map(|(k, v)| (k.to_vec(), *v));
        assert_eq!(tree_min, model_min, "minimum mismatch");

        let model_max = self
            .model
            .map
            .last_key_value()
            .map(|(k, v)| (Self::stored_key(k), *v));
        let tree_max = self.tree.maximum().map(|(k, v)| (k.to_vec(), *v));
        assert_eq!(tree_max, model_max, "maximum mismatch");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::default();
        for action in actions {
            test.execute(action);
        }
        test.finish();
    }

    #[test]
    fn proptest_insert_all_then_delete_all(keys in prop::collection::vec(any::<Key>(), 1..128)) {
        let mut test = Test::default();
        for (i, key) in keys.iter().enumerate() {
            test.execute(Action::Insert(KeyValue { key: key.clone(), value: i as u64 }));
        }
        test.finish();

        for key in &keys {
            test.execute(Action::Delete(key.clone()));
        }
        prop_assert_eq!(test.tree.size(), 0);
        prop_assert!(test.tree.is_empty());
        prop_assert!(test.tree.minimum().is_none());
    }
}
