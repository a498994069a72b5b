use store::{State, Value};
use tracing::debug;

/// Overlays freshly derived fields on the next base state.
///
/// A fresh value that `equality` considers equal to the previous value of the same field is replaced by the previous
/// value, so the field keeps its identity. Derived fields are applied last and win over base fields of the same name.
pub fn merge_computed(
    base_next: State,
    derived_previous: &State,
    derived_fresh: State,
    equality: impl Fn(&Value, &Value) -> bool,
) -> State {
    let mut merged = base_next;

    for (key, fresh) in derived_fresh {
        let value = match derived_previous.get(&key) {
            Some(previous) if equality(previous, &fresh) => previous.clone(),
            _ => fresh,
        };

        if merged.contains_key(&key) {
            debug!("Derived field overrides a base field. key: {}", key);
        }
        merged.insert(key, value);
    }

    merged
}

/// Overlays the previous derived fields, as they are, on the next base state.
pub fn carry_over(base_next: State, derived_previous: &State) -> State {
    let mut merged = base_next;
    merged.extend(
        derived_previous
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    merged
}

#[cfg(test)]
mod tests {
    use store::state;

    use super::*;
    use crate::equality::{never, shallow};

    #[test]
    fn equal_fields_keep_the_previous_instance() {
        let previous_nested = Value::map([("stringified", "1")]);
        let derived_previous = state! { "countSq" => 1, "nested" => previous_nested.clone() };
        let derived_fresh = state! { "countSq" => 1, "nested" => Value::map([("stringified", "1")]) };

        let merged = merge_computed(state! { "count" => 1 }, &derived_previous, derived_fresh, shallow);

        assert!(merged["nested"].is_identical(&previous_nested));
        assert_eq!(merged, state! { "count" => 1, "countSq" => 1, "nested" => previous_nested });
    }

    #[test]
    fn changed_fields_take_the_fresh_value() {
        let derived_previous = state! { "nested" => Value::map([("stringified", "1")]) };
        let fresh_nested = Value::map([("stringified", "2")]);

        let merged = merge_computed(
            state! { "count" => 2 },
            &derived_previous,
            state! { "nested" => fresh_nested.clone() },
            shallow,
        );

        assert!(merged["nested"].is_identical(&fresh_nested));
    }

    #[test]
    fn never_equal_always_takes_the_fresh_value() {
        let derived_previous = state! { "nested" => Value::map([("stringified", "1")]) };
        let fresh_nested = Value::map([("stringified", "1")]);

        let merged = merge_computed(State::new(), &derived_previous, state! { "nested" => fresh_nested.clone() }, never);

        assert!(merged["nested"].is_identical(&fresh_nested));
        assert!(!merged["nested"].is_identical(&derived_previous["nested"]));
    }

    #[test]
    fn derived_fields_win_over_base_fields() {
        let merged = merge_computed(state! { "total" => 1 }, &State::new(), state! { "total" => 2 }, shallow);

        assert_eq!(merged, state! { "total" => 2 });
    }

    #[test]
    fn carry_over_keeps_previous_instances() {
        let nested = Value::list([1]);
        let derived_previous = state! { "nested" => nested.clone() };

        let merged = carry_over(state! { "count" => 5 }, &derived_previous);

        assert!(merged["nested"].is_identical(&nested));
        assert_eq!(merged.get("count"), Some(&Value::from(5)));
    }
}
