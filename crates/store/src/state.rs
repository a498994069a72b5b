use indexmap::{map, IndexMap, IndexSet};

use crate::error::StoreError;
use crate::value::Value;

/// A mapping from field name to value, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct State(IndexMap<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0
            .insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> map::Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn iter(&self) -> map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new state with the fields of `partial` written over the fields of `self`.
    ///
    /// `self` is left untouched, fields that `partial` does not mention keep their values (and their identity).
    pub fn merged(&self, partial: &State) -> State {
        let mut next = self.clone();
        next.extend(
            partial
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        next
    }

    pub fn without_keys(&self, keys: &IndexSet<String>) -> State {
        self.iter()
            .filter(|(key, _)| !keys.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn only_keys(&self, keys: &IndexSet<String>) -> State {
        self.iter()
            .filter(|(key, _)| keys.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// The names of the fields that differ between `self` and `next`.
    ///
    /// A field differs when it was added, removed, or when its value is not identical (see [`Value::is_identical`]).
    /// Removed fields are listed after the others.
    pub fn changed_keys(&self, next: &State) -> IndexSet<String> {
        let mut changed = next
            .iter()
            .filter(|(key, value)| {
                self.get(key)
                    .map_or(true, |previous| !previous.is_identical(value))
            })
            .map(|(key, _)| key.clone())
            .collect::<IndexSet<_>>();

        changed.extend(
            self.keys()
                .filter(|key| !next.contains_key(key))
                .cloned(),
        );

        changed
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        State(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for State {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0.extend(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }
}

impl IntoIterator for State {
    type Item = (String, Value);
    type IntoIter = map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a State {
    type Item = (&'a String, &'a Value);
    type IntoIter = map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<serde_json::Value> for State {
    type Error = StoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(entries) => Ok(entries.into_iter().collect()),
            other => Err(StoreError::NotAnObject(other.to_string())),
        }
    }
}

impl std::ops::Index<&str> for State {
    type Output = Value;

    /// # Panics
    ///
    /// Panics if the field is absent.
    fn index(&self, key: &str) -> &Self::Output {
        &self.0[key]
    }
}

/// Builds a [`State`] from `key => value` pairs.
///
/// ```
/// let state = store::state! { "count" => 1, "label" => "one" };
/// assert_eq!(state.len(), 2);
/// ```
#[macro_export]
macro_rules! state {
    () => {
        $crate::State::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut state = $crate::State::new();
        $(
            state.insert($key, $value);
        )+
        state
    }};
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merged_leaves_the_original_untouched() {
        let previous = state! { "count" => 1, "x" => 1 };

        let next = previous.merged(&state! { "count" => 2 });

        assert_eq!(previous, state! { "count" => 1, "x" => 1 });
        assert_eq!(next, state! { "count" => 2, "x" => 1 });
    }

    #[test]
    fn merged_keeps_unmentioned_values_identical() {
        let previous = state! { "items" => Value::list([1, 2]), "count" => 1 };

        let next = previous.merged(&state! { "count" => 2 });

        assert!(next["items"].is_identical(&previous["items"]));
    }

    #[test]
    fn changed_keys_lists_added_removed_and_replaced_fields() {
        let items = Value::list([1]);
        let previous = state! { "a" => 1, "b" => items.clone(), "c" => Value::list([1]), "d" => true };
        let next = state! { "a" => 1, "b" => items, "c" => Value::list([1]), "e" => false };

        let changed = previous.changed_keys(&next);

        assert_eq!(
            changed
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["c", "e", "d"]
        );
    }

    #[test]
    fn without_and_only_keys_partition_a_state() {
        let state = state! { "count" => 2, "countSq" => 4 };
        let derived = ["countSq".to_string()]
            .into_iter()
            .collect::<IndexSet<_>>();

        assert_eq!(state.without_keys(&derived), state! { "count" => 2 });
        assert_eq!(state.only_keys(&derived), state! { "countSq" => 4 });
    }

    #[test]
    fn try_from_json_requires_an_object() {
        let state = State::try_from(json!({"count": 1})).unwrap();
        assert_eq!(state, state! { "count" => 1 });

        let result = State::try_from(json!([1, 2]));
        assert!(matches!(result, Err(StoreError::NotAnObject(_))));
    }

    #[test]
    fn serializes_as_a_plain_object() {
        let state = state! { "count" => 1, "label" => "one" };

        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"count":1,"label":"one"}"#);
    }
}
