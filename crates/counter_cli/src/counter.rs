use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;
use computed::{create_computed, ComputedError, ComputedOptions};
use store::{state, State, Store, Update};
use tracing::info;

use crate::opts::Action;

/// A store holding `count` with `countSq` derived from it.
pub(crate) struct Counter {
    store: Store,
    derivations: Arc<AtomicUsize>,
}

impl Counter {
    pub(crate) fn new(start: f64, options: ComputedOptions) -> Result<Self, ComputedError> {
        let derivations = Arc::new(AtomicUsize::new(0));
        let derivations_in_compute = derivations.clone();

        let store = create_computed(
            move |_store| state! { "count" => start },
            move |state| {
                derivations_in_compute.fetch_add(1, Ordering::SeqCst);
                let count = state.number("count")?;
                Ok(state! { "countSq" => count * count })
            },
            options,
        )?;

        Ok(Self {
            store,
            derivations,
        })
    }

    pub(crate) fn apply(&self, action: Action) -> anyhow::Result<()> {
        info!("Applying action. action: {:?}", action);

        match action {
            Action::Inc => self
                .store
                .set_state(Update::with(|state| state! { "count" => count(state) + 1.0 }))?,
            Action::Dec => self
                .store
                .set_state(Update::with(|state| state! { "count" => count(state) - 1.0 }))?,
            Action::Square => {
                // derived fields are readable like any other
                let count_sq = self.field("countSq")?;
                self.store
                    .set_state(state! { "count" => count_sq })?
            }
            Action::Root => {
                let count = self.field("count")?;
                if count < 0.0 {
                    bail!("Cannot take the root of a negative count. count: {}", count);
                }
                self.store
                    .set_state(state! { "count" => count.sqrt().floor() })?
            }
        }

        Ok(())
    }

    pub(crate) fn state(&self) -> Arc<State> {
        self.store.get_state()
    }

    /// How many times `countSq` was derived, including the initial derivation.
    pub(crate) fn derivations(&self) -> usize {
        self.derivations.load(Ordering::SeqCst)
    }

    fn field(&self, key: &str) -> anyhow::Result<f64> {
        let state = self.store.get_state();
        match state.get(key).and_then(|value| value.as_f64()) {
            Some(value) => Ok(value),
            None => bail!("Missing numeric field. key: {}", key),
        }
    }
}

fn count(state: &State) -> f64 {
    state
        .get("count")
        .and_then(|value| value.as_f64())
        .unwrap_or_default()
}
