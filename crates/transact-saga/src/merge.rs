use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;
use serde_json::Value;

/// Ready-made transaction state: an ordered map of named JSON fields.
pub type State = IndexMap<String, Value>;

/// Shallow, override-only merge of a partial update into a state value.
///
/// Every field present in the update replaces the corresponding field of
/// the state. Fields absent from the update are kept. Nested values are
/// replaced wholesale, never merged recursively.
pub trait Merge: Sized {
    /// Partial update reported by a step.
    type Update: Send + 'static;

    #[must_use]
    fn merge(self, update: Self::Update) -> Self;
}

impl<K, V, H> Merge for IndexMap<K, V, H>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    H: BuildHasher + Send + 'static,
{
    type Update = IndexMap<K, V, H>;

    fn merge(mut self, update: Self::Update) -> Self {
        for (key, value) in update {
            self.insert(key, value);
        }
        self
    }
}

impl<K, V, H> Merge for HashMap<K, V, H>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    H: BuildHasher + Send + 'static,
{
    type Update = HashMap<K, V, H>;

    fn merge(mut self, update: Self::Update) -> Self {
        self.extend(update);
        self
    }
}

impl Merge for serde_json::Map<String, Value> {
    type Update = serde_json::Map<String, Value>;

    fn merge(mut self, update: Self::Update) -> Self {
        for (key, value) in update {
            self.insert(key, value);
        }
        self
    }
}

/// Merge an optional update, keeping the state unchanged when there is none.
pub(crate) fn shallow_merge<S: Merge>(state: S, update: Option<S::Update>) -> S {
    match update {
        Some(update) => state.merge(update),
        None => state,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(value: Value) -> State {
        serde_json::from_value(value).expect("object literal")
    }

    #[test]
    fn nested_values_are_replaced_not_merged() {
        let merged = state(json!({"a": 1, "b": {"x": 1}})).merge(state(json!({"b": {"y": 2}})));
        assert_eq!(merged, state(json!({"a": 1, "b": {"y": 2}})));
    }

    #[test]
    fn absent_fields_are_preserved_and_present_fields_override() {
        let merged = state(json!({"a": 1, "b": 2})).merge(state(json!({"b": 3, "c": 4})));
        assert_eq!(merged, state(json!({"a": 1, "b": 3, "c": 4})));
    }

    #[test]
    fn explicit_null_overrides_field() {
        let merged = state(json!({"a": 1})).merge(state(json!({"a": null})));
        assert_eq!(merged.get("a"), Some(&Value::Null));
    }

    #[test]
    fn missing_update_leaves_state_untouched() {
        let original = state(json!({"a": 1}));
        assert_eq!(shallow_merge(original.clone(), None), original);
    }

    #[test]
    fn hash_map_merge_overrides() {
        let base: HashMap<&str, i32> = HashMap::from([("a", 1), ("b", 2)]);
        let merged = base.merge(HashMap::from([("b", 20)]));
        assert_eq!(merged, HashMap::from([("a", 1), ("b", 20)]));
    }

    #[test]
    fn json_map_merge_overrides() {
        let Value::Object(base) = json!({"a": [1, 2], "keep": true}) else {
            unreachable!()
        };
        let Value::Object(update) = json!({"a": [3]}) else {
            unreachable!()
        };
        let merged = base.merge(update);
        assert_eq!(Value::Object(merged), json!({"a": [3], "keep": true}));
    }
}
