//! Policies deciding whether a freshly derived value is "the same" as the previous one.
//!
//! When a recomputed field is equal to its previous value the previous value is kept, so consumers comparing values
//! by identity see no change.

use std::sync::Arc;

use store::Value;

pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Compares scalars by value and containers one level deep.
///
/// Two lists are equal when they have the same length and their items are pairwise identical, two maps are equal when
/// they have the same keys and identical values under each key. Nested containers compare by identity.
pub fn shallow(a: &Value, b: &Value) -> bool {
    if a.is_identical(b) {
        return true;
    }

    match (a, b) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(a, b)| a.is_identical(b))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| {
                        b.get(key)
                            .is_some_and(|b| a.is_identical(b))
                    })
        }
        _ => false,
    }
}

/// Compares containers by content, at every depth.
pub fn deep(a: &Value, b: &Value) -> bool {
    if a.is_identical(b) {
        return true;
    }

    match (a, b) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(a, b)| deep(a, b))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| {
                        b.get(key)
                            .is_some_and(|b| deep(a, b))
                    })
        }
        _ => false,
    }
}

/// Never equal, every recomputed field is treated as changed.
pub fn never(_a: &Value, _b: &Value) -> bool {
    false
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityKind {
    #[default]
    Shallow,
    Deep,
    Never,
}

impl EqualityKind {
    pub fn equality_fn(self) -> EqualityFn {
        match self {
            EqualityKind::Shallow => Arc::new(shallow),
            EqualityKind::Deep => Arc::new(deep),
            EqualityKind::Never => Arc::new(never),
        }
    }
}
