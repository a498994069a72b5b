use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use store::{SetMode, Setter, State, Store, StoreError, Update};
use tracing::{debug, trace, warn};

use crate::derive::{Invoker, Snapshot};
use crate::equality::{shallow, EqualityFn};
use crate::error::ComputedError;
use crate::merge::{carry_over, merge_computed};
use crate::options::ComputedOptions;
use crate::recompute::RecomputePolicy;

/// Wraps the store's setter so that every update is checked for recomputation and merged with the derived fields
/// before it is committed.
struct ComputedSetter {
    next: Arc<dyn Setter>,
    invoker: Invoker,
    policy: RecomputePolicy,
    equality: EqualityFn,
    /// Names of the fields produced by the most recent derivation.
    derived_keys: RwLock<IndexSet<String>>,
}

impl ComputedSetter {
    fn new(next: Arc<dyn Setter>, invoker: Invoker, options: &ComputedOptions) -> Self {
        let policy = RecomputePolicy::from_options(options);
        let equality = options
            .equality
            .clone()
            .unwrap_or_else(|| Arc::new(shallow));

        debug!("Computed setter installed. policy: {:?}", policy);

        Self {
            next,
            invoker,
            policy,
            equality,
            derived_keys: RwLock::new(IndexSet::new()),
        }
    }

    /// Runs the first derivation against the initializer's state.
    ///
    /// There are no previous derived values yet, the output is applied without reconciliation.
    fn initialize(&self, base: State) -> Result<State, ComputedError> {
        let derived = self.invoker.invoke(&base, &self.policy)?;

        for key in derived
            .keys()
            .filter(|key| base.contains_key(key))
        {
            warn!(
                "Derived field shadows a base field, the derived value wins and the base field can no longer be written. key: {}",
                key
            );
        }

        *self.derived_keys.write() = derived.keys().cloned().collect();

        Ok(carry_over(base, &derived))
    }
}

impl Setter for ComputedSetter {
    fn set(&self, store: &Store, update: Update<'_>, mode: SetMode) -> Result<(), StoreError> {
        let previous = store.get_state();
        let derived_keys = self.derived_keys.read().clone();

        let resolved = update.resolve(&previous);
        let (tentative, touched) = match mode {
            SetMode::Merge => {
                let touched = resolved
                    .keys()
                    .cloned()
                    .collect::<IndexSet<_>>();
                (previous.merged(&resolved), touched)
            }
            SetMode::Replace => {
                let touched = previous.changed_keys(&resolved);
                (resolved, touched)
            }
        };

        // writes to derived fields are discarded, they never count as touched
        let base_next = tentative.without_keys(&derived_keys);
        let touched = touched
            .into_iter()
            .filter(|key| !derived_keys.contains(key))
            .collect::<IndexSet<_>>();
        let derived_previous = previous.only_keys(&derived_keys);

        let (merged, next_derived_keys) = if self
            .policy
            .should_recompute(&previous, &base_next, &touched)
        {
            trace!("Recomputing derived state. touched: {:?}", touched);
            let derived_fresh = self.invoker.invoke(&base_next, &self.policy)?;
            let next_derived_keys = derived_fresh
                .keys()
                .cloned()
                .collect::<IndexSet<_>>();

            let merged = merge_computed(base_next, &derived_previous, derived_fresh, &*self.equality);
            (merged, next_derived_keys)
        } else {
            debug!("Skipping recomputation. touched: {:?}", touched);
            (carry_over(base_next, &derived_previous), derived_keys)
        };

        // updated before committing, listeners issuing nested updates must see the new derived fields
        let previous_derived_keys = std::mem::replace(&mut *self.derived_keys.write(), next_derived_keys);

        if let Err(error) = self
            .next
            .set(store, Update::Value(merged), SetMode::Replace)
        {
            *self.derived_keys.write() = previous_derived_keys;
            return Err(error);
        }

        Ok(())
    }
}

/// Adds derived fields to a store.
///
/// Returns a creator for [`Store::try_create`]. The creator installs the interceptor in place of the store's setter,
/// runs `initializer`, then runs `compute` against the initializer's state; the store's initial state is the
/// initializer's fields plus the derived fields.
///
/// Afterwards every update, whichever way it is issued, is resolved to a tentative base state, checked against the
/// recomputation policy from `options`, recomputed and merged if warranted, and committed through the setter that was
/// installed before. Derived fields cannot be written through the store, such writes are discarded.
///
/// If `compute` fails during an update the update is rejected with [`StoreError::UpdateRejected`], the cause being a
/// [`ComputedError::Derivation`], and the state is left as it was.
pub fn computed<I, C>(
    initializer: I,
    compute: C,
    options: ComputedOptions,
) -> impl FnOnce(&Store) -> Result<State, ComputedError>
where
    I: FnOnce(&Store) -> State,
    C: Fn(&Snapshot<'_>) -> anyhow::Result<State> + Send + Sync + 'static,
{
    move |store: &Store| {
        let setter = Arc::new(ComputedSetter::new(store.setter(), Invoker::new(compute), &options));
        store.install_setter(setter.clone());

        let base = initializer(store);
        setter.initialize(base)
    }
}

/// Creates a store with derived fields, see [`computed`].
pub fn create_computed<I, C>(initializer: I, compute: C, options: ComputedOptions) -> Result<Store, ComputedError>
where
    I: FnOnce(&Store) -> State,
    C: Fn(&Snapshot<'_>) -> anyhow::Result<State> + Send + Sync + 'static,
{
    Store::try_create(computed(initializer, compute, options))
}
