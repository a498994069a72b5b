use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use store::{State, Value};

use crate::equality::{EqualityFn, EqualityKind};
use crate::error::ComputedError;
use crate::recompute::RecomputeFn;

/// Options for when and how the derivation function is called.
///
/// When more than one way of deciding whether to recompute is configured, `should_recompute` wins over `keys`, which
/// wins over `track_dependencies`. Without any of them every update recomputes.
#[derive(Clone, Default)]
pub struct ComputedOptions {
    pub(crate) keys: Option<Vec<String>>,
    pub(crate) should_recompute: Option<RecomputeFn>,
    pub(crate) track_dependencies: bool,
    pub(crate) equality: Option<EqualityFn>,
    pub(crate) disable_proxy: bool,
}

impl ComputedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute only when an update touches one of these fields.
    ///
    /// For a partial update the touched fields are the fields it mentions, fields it does not mention are presumed
    /// unchanged. For a replacement they are the fields that were added, removed or changed.
    pub fn keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = Some(
            keys.into_iter()
                .map(Into::into)
                .collect(),
        );
        self
    }

    /// Decide with a predicate, called on every update with the previous state and the tentative next base state.
    ///
    /// It must be fast and free of side effects.
    pub fn should_recompute(mut self, predicate: impl Fn(&State, &State) -> bool + Send + Sync + 'static) -> Self {
        self.should_recompute = Some(Arc::new(predicate));
        self
    }

    /// Learn the dependencies from the fields the derivation function reads.
    ///
    /// A field, once read, stays a dependency for the lifetime of the store.
    pub fn track_dependencies(mut self) -> Self {
        self.track_dependencies = true;
        self
    }

    /// Override how recomputed fields are compared with their previous values, [`crate::shallow`] by default.
    pub fn equality_fn(mut self, equality: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.equality = Some(Arc::new(equality));
        self
    }

    #[deprecated(note = "has no effect, use `track_dependencies` to infer dependencies")]
    pub fn disable_proxy(mut self, disable: bool) -> Self {
        self.disable_proxy = disable;
        self
    }
}

impl fmt::Debug for ComputedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedOptions")
            .field("keys", &self.keys)
            .field("should_recompute", &self.should_recompute.is_some())
            .field("track_dependencies", &self.track_dependencies)
            .field("equality", &self.equality.is_some())
            .field("disable_proxy", &self.disable_proxy)
            .finish()
    }
}

/// Declarative form of [`ComputedOptions`], e.g. loaded from a JSON file.
///
/// ```json
/// { "keys": ["count"], "equality": "deep" }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputedConfig {
    pub keys: Option<Vec<String>>,
    pub track_dependencies: bool,
    pub equality: EqualityKind,
    /// Ignored, accepted so that existing configuration files keep loading.
    pub disable_proxy: bool,
}

impl ComputedConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputedError> {
        serde_json::from_str(json).map_err(ComputedError::Config)
    }
}

impl FromStr for ComputedConfig {
    type Err = ComputedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

impl From<ComputedConfig> for ComputedOptions {
    fn from(config: ComputedConfig) -> Self {
        let ComputedConfig {
            keys,
            track_dependencies,
            equality,
            disable_proxy,
        } = config;

        ComputedOptions {
            keys,
            should_recompute: None,
            track_dependencies,
            equality: Some(equality.equality_fn()),
            disable_proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn config_defaults_to_shallow_equality_and_no_dependencies() {
        let config = ComputedConfig::from_json("{}").unwrap();

        assert_eq!(config, ComputedConfig::default());
        assert_eq!(config.equality, EqualityKind::Shallow);
    }

    #[test]
    fn config_converts_to_options() {
        let config: ComputedConfig = indoc! {r#"
            {
                "keys": ["x", "y"],
                "equality": "never",
                "disable_proxy": true
            }
        "#}
        .parse()
        .unwrap();

        let options = ComputedOptions::from(config);

        assert_eq!(options.keys, Some(vec!["x".to_string(), "y".to_string()]));
        assert!(!options.track_dependencies);
        assert!(options.disable_proxy);

        let equality = options.equality.unwrap();
        assert!(!equality(&Value::from(1), &Value::from(1)));
    }

    #[test]
    fn unknown_config_fields_are_rejected() {
        let result = ComputedConfig::from_json(r#"{ "key": ["x"] }"#);

        assert!(matches!(result, Err(ComputedError::Config(_))));
    }
}
