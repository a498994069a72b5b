use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use store::State;
use tracing::{trace, warn};

use crate::options::ComputedOptions;

pub type RecomputeFn = Arc<dyn Fn(&State, &State) -> bool + Send + Sync>;

/// Decides whether an update warrants running the derivation function again.
pub enum RecomputePolicy {
    /// Every update recomputes.
    Always,
    /// Recompute when the update touches one of these fields.
    Keys(IndexSet<String>),
    /// Like `Keys`, with the fields learned from the reads made by the derivation function.
    Tracked(TrackedKeys),
    /// Caller supplied predicate, receives the previous state and the tentative next base state.
    Predicate(RecomputeFn),
}

impl RecomputePolicy {
    pub fn from_options(options: &ComputedOptions) -> Self {
        if let Some(predicate) = &options.should_recompute {
            if options.keys.is_some() {
                warn!("Both `should_recompute` and `keys` configured, ignoring `keys`.");
            }
            if options.track_dependencies {
                warn!("Both `should_recompute` and `track_dependencies` configured, ignoring `track_dependencies`.");
            }
            return RecomputePolicy::Predicate(predicate.clone());
        }

        if let Some(keys) = &options.keys {
            if options.track_dependencies {
                warn!("Both `keys` and `track_dependencies` configured, ignoring `track_dependencies`.");
            }
            return RecomputePolicy::Keys(keys.iter().cloned().collect());
        }

        if options.track_dependencies {
            return RecomputePolicy::Tracked(TrackedKeys::default());
        }

        RecomputePolicy::Always
    }

    /// `touched` holds the names of the base fields the update wrote to.
    pub fn should_recompute(&self, previous: &State, next: &State, touched: &IndexSet<String>) -> bool {
        match self {
            RecomputePolicy::Always => true,
            RecomputePolicy::Keys(keys) => intersects(keys, touched),
            RecomputePolicy::Tracked(tracked) => tracked.should_recompute(touched),
            RecomputePolicy::Predicate(predicate) => predicate(previous, next),
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self, RecomputePolicy::Tracked(_))
    }

    /// Adds the fields read by a derivation to the tracked dependencies, does nothing unless tracking.
    pub fn record_reads(&self, reads: IndexSet<String>) {
        if let RecomputePolicy::Tracked(tracked) = self {
            tracked.record(reads);
        }
    }

    /// The fields whose change triggers a recomputation.
    ///
    /// `None` when there is no such list, i.e. when every update recomputes or when a predicate decides.
    pub fn dependencies(&self) -> Option<IndexSet<String>> {
        match self {
            RecomputePolicy::Keys(keys) => Some(keys.clone()),
            RecomputePolicy::Tracked(tracked) => Some(tracked.snapshot()),
            RecomputePolicy::Always | RecomputePolicy::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for RecomputePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecomputePolicy::Always => f.write_str("Always"),
            RecomputePolicy::Keys(keys) => f
                .debug_tuple("Keys")
                .field(keys)
                .finish(),
            RecomputePolicy::Tracked(tracked) => f
                .debug_tuple("Tracked")
                .field(&tracked.snapshot())
                .finish(),
            RecomputePolicy::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

fn intersects(keys: &IndexSet<String>, touched: &IndexSet<String>) -> bool {
    touched
        .iter()
        .any(|key| keys.contains(key))
}

/// The union of the fields read by every derivation so far, never shrinks.
#[derive(Debug, Default)]
pub struct TrackedKeys(RwLock<IndexSet<String>>);

impl TrackedKeys {
    pub fn record(&self, reads: IndexSet<String>) {
        let mut keys = self.0.write();
        for key in reads {
            if !keys.contains(&key) {
                trace!("Tracking dependency. key: {}", key);
                keys.insert(key);
            }
        }
    }

    pub fn snapshot(&self) -> IndexSet<String> {
        self.0.read().clone()
    }

    /// Nothing tracked yet means nothing is known about the dependencies, so recompute.
    fn should_recompute(&self, touched: &IndexSet<String>) -> bool {
        let keys = self.0.read();
        keys.is_empty() || intersects(&keys, touched)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use store::state;

    use super::*;

    fn key_set(keys: &[&str]) -> IndexSet<String> {
        keys.iter()
            .map(|key| key.to_string())
            .collect()
    }

    #[rstest]
    #[case(&["count"], true)]
    #[case(&["x"], true)]
    #[case(&["count", "x"], true)]
    #[case(&[], true)]
    fn test_always(#[case] touched: &[&str], #[case] expected: bool) {
        let policy = RecomputePolicy::from_options(&ComputedOptions::new());

        assert_eq!(policy.should_recompute(&state!(), &state!(), &key_set(touched)), expected);
    }

    #[rstest]
    #[case(&["count"], false)]
    #[case(&["x"], true)]
    #[case(&["count", "y"], true)]
    #[case(&[], false)]
    fn test_keys(#[case] touched: &[&str], #[case] expected: bool) {
        let policy = RecomputePolicy::from_options(&ComputedOptions::new().keys(["x", "y"]));

        assert_eq!(policy.should_recompute(&state!(), &state!(), &key_set(touched)), expected);
    }

    #[test]
    fn tracked_recomputes_until_something_is_tracked() {
        let policy = RecomputePolicy::from_options(&ComputedOptions::new().track_dependencies());

        assert!(policy.should_recompute(&state!(), &state!(), &key_set(&["anything"])));

        policy.record_reads(key_set(&["count"]));

        assert!(policy.should_recompute(&state!(), &state!(), &key_set(&["count"])));
        assert!(!policy.should_recompute(&state!(), &state!(), &key_set(&["anything"])));
    }

    #[test]
    fn tracked_keys_only_grow() {
        let tracked = TrackedKeys::default();

        tracked.record(key_set(&["a", "b"]));
        tracked.record(key_set(&["b"]));
        tracked.record(key_set(&[]));

        assert_eq!(tracked.snapshot(), key_set(&["a", "b"]));
    }

    #[test]
    fn predicate_receives_previous_and_next() {
        let options = ComputedOptions::new().should_recompute(|previous, next| previous.get("count") != next.get("count"));
        let policy = RecomputePolicy::from_options(&options);

        let touched = key_set(&["count"]);
        assert!(!policy.should_recompute(&state! { "count" => 1 }, &state! { "count" => 1 }, &touched));
        assert!(policy.should_recompute(&state! { "count" => 1 }, &state! { "count" => 2 }, &touched));
    }

    #[test]
    fn predicate_wins_over_keys_and_tracking() {
        let options = ComputedOptions::new()
            .keys(["x"])
            .track_dependencies()
            .should_recompute(|_, _| false);

        let policy = RecomputePolicy::from_options(&options);

        assert!(matches!(policy, RecomputePolicy::Predicate(_)));
        assert!(!policy.should_recompute(&state!(), &state!(), &key_set(&["x"])));
    }

    #[test]
    fn keys_win_over_tracking() {
        let options = ComputedOptions::new()
            .track_dependencies()
            .keys(["x"]);

        let policy = RecomputePolicy::from_options(&options);

        assert_eq!(policy.dependencies(), Some(key_set(&["x"])));
        assert!(!policy.is_tracking());
    }
}
