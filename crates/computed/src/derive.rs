use std::cell::RefCell;

use anyhow::anyhow;
use indexmap::IndexSet;
use store::{State, Value};
use tracing::trace;

use crate::error::ComputedError;
use crate::recompute::RecomputePolicy;

type ComputeFn = Box<dyn Fn(&Snapshot<'_>) -> anyhow::Result<State> + Send + Sync>;

/// Read access to the base state handed to the derivation function.
///
/// Fields are read through accessor calls so that, when dependency tracking is enabled, every read is recorded. A
/// field read only in a branch that was not taken is not recorded for that call.
pub struct Snapshot<'a> {
    state: &'a State,
    reads: Option<RefCell<IndexSet<String>>>,
}

impl<'a> Snapshot<'a> {
    /// A snapshot that records nothing.
    pub fn new(state: &'a State) -> Self {
        Self {
            state,
            reads: None,
        }
    }

    /// A snapshot that records the name of every field read through it.
    pub fn tracking(state: &'a State) -> Self {
        Self {
            state,
            reads: Some(RefCell::new(IndexSet::new())),
        }
    }

    fn record(&self, key: &str) {
        if let Some(reads) = &self.reads {
            let mut reads = reads.borrow_mut();
            if !reads.contains(key) {
                reads.insert(key.to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.record(key);
        self.state.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.record(key);
        self.state.contains_key(key)
    }

    /// Reads a numeric field, failing when it is absent or not a number.
    pub fn number(&self, key: &str) -> anyhow::Result<f64> {
        match self.get(key) {
            Some(Value::Number(value)) => Ok(*value),
            Some(other) => Err(anyhow!("Field is not a number. key: {}, value: {}", key, other)),
            None => Err(anyhow!("Missing field. key: {}", key)),
        }
    }

    /// Iterates over every field, recording each one as it is visited.
    pub fn iter(&self) -> impl Iterator<Item = (&'a String, &'a Value)> + '_ {
        self.state
            .iter()
            .inspect(move |(key, _)| self.record(key))
    }

    /// A copy of the whole base state, every field counts as read.
    pub fn to_state(&self) -> State {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// The fields read so far, empty unless tracking.
    pub fn reads(&self) -> IndexSet<String> {
        self.reads
            .as_ref()
            .map(|reads| reads.borrow().clone())
            .unwrap_or_default()
    }

    fn into_reads(self) -> IndexSet<String> {
        self.reads
            .map(RefCell::into_inner)
            .unwrap_or_default()
    }
}

/// Calls the derivation function, once per call to [`Invoker::invoke`].
pub(crate) struct Invoker {
    compute: ComputeFn,
}

impl Invoker {
    pub(crate) fn new(compute: impl Fn(&Snapshot<'_>) -> anyhow::Result<State> + Send + Sync + 'static) -> Self {
        Self {
            compute: Box::new(compute),
        }
    }

    /// Computes the derived fields for `base`.
    ///
    /// When the policy tracks dependencies the fields read by a successful call are added to them.
    pub(crate) fn invoke(&self, base: &State, policy: &RecomputePolicy) -> Result<State, ComputedError> {
        let snapshot = match policy.is_tracking() {
            true => Snapshot::tracking(base),
            false => Snapshot::new(base),
        };

        let derived = (self.compute)(&snapshot).map_err(ComputedError::Derivation)?;

        policy.record_reads(snapshot.into_reads());

        trace!(
            "Computed derived state. keys: {:?}",
            derived
                .keys()
                .collect::<Vec<_>>()
        );

        Ok(derived)
    }
}
