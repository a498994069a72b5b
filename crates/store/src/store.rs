use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use slotmap::{new_key_type, SlotMap};
use tracing::trace;

use crate::error::StoreError;
use crate::state::State;
use crate::update::{SetMode, Update};

new_key_type! {
    /// Identifies a listener registered with [`Store::subscribe`].
    pub struct ListenerKey;
}

type Listener = Arc<dyn Fn(&State, &State) + Send + Sync>;

/// The single indirection point every update flows through.
///
/// A store starts with its native setter installed, which resolves the update, commits the result and notifies the
/// listeners. A layer that needs to see every state transition takes the currently installed setter (see
/// [`Store::setter`]), installs itself in its place (see [`Store::install_setter`]) and forwards the final state to
/// the setter it replaced.
pub trait Setter: Send + Sync {
    fn set(&self, store: &Store, update: Update<'_>, mode: SetMode) -> Result<(), StoreError>;
}

struct NativeSetter;

impl Setter for NativeSetter {
    fn set(&self, store: &Store, update: Update<'_>, mode: SetMode) -> Result<(), StoreError> {
        store.commit(update, mode);
        Ok(())
    }
}

struct StoreInner {
    state: RwLock<Arc<State>>,
    initial_state: RwLock<Arc<State>>,
    listeners: Mutex<SlotMap<ListenerKey, Listener>>,
    setter: RwLock<Arc<dyn Setter>>,
    /// Held for the whole setter chain, re-entrant so listeners can issue nested updates.
    update_lock: ReentrantMutex<()>,
}

/// A handle to a store, cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a store, `initializer` returns the initial state.
    ///
    /// The initializer receives the store before it holds any state, it may install setters and keep the handle to
    /// issue updates later.
    pub fn create(initializer: impl FnOnce(&Store) -> State) -> Store {
        let store = Self::empty();
        let state = initializer(&store);
        store.initialize(state);
        store
    }

    /// Like [`Store::create`], for creators that can fail.
    pub fn try_create<E>(creator: impl FnOnce(&Store) -> Result<State, E>) -> Result<Store, E> {
        let store = Self::empty();
        let state = creator(&store)?;
        store.initialize(state);
        Ok(store)
    }

    fn empty() -> Store {
        let state = Arc::new(State::new());
        Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state.clone()),
                initial_state: RwLock::new(state),
                listeners: Mutex::new(SlotMap::with_key()),
                setter: RwLock::new(Arc::new(NativeSetter)),
                update_lock: ReentrantMutex::new(()),
            }),
        }
    }

    fn initialize(&self, state: State) {
        let state = Arc::new(state);
        trace!(
            "Store initialized. keys: {:?}",
            state
                .keys()
                .collect::<Vec<_>>()
        );
        *self.inner.initial_state.write() = state.clone();
        *self.inner.state.write() = state;
    }

    pub fn get_state(&self) -> Arc<State> {
        self.inner.state.read().clone()
    }

    pub fn get_initial_state(&self) -> Arc<State> {
        self.inner
            .initial_state
            .read()
            .clone()
    }

    /// Merges the update into the current state.
    pub fn set_state<'a>(&self, update: impl Into<Update<'a>>) -> Result<(), StoreError> {
        self.set(update, SetMode::Merge)
    }

    /// Replaces the current state with the update.
    pub fn replace_state<'a>(&self, update: impl Into<Update<'a>>) -> Result<(), StoreError> {
        self.set(update, SetMode::Replace)
    }

    /// Routes the update through the installed setter.
    ///
    /// Updates are applied one at a time, in the order they are issued. An update issued by a listener, from the
    /// thread that is committing, runs to completion before the outer update returns.
    pub fn set<'a>(&self, update: impl Into<Update<'a>>, mode: SetMode) -> Result<(), StoreError> {
        let _guard = self.inner.update_lock.lock();
        let setter = self.setter();
        setter.set(self, update.into(), mode)
    }

    pub fn subscribe(&self, listener: impl Fn(&State, &State) + Send + Sync + 'static) -> ListenerKey {
        self.inner
            .listeners
            .lock()
            .insert(Arc::new(listener))
    }

    /// Returns `false` if the listener was not subscribed.
    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.inner
            .listeners
            .lock()
            .remove(key)
            .is_some()
    }

    /// Removes every listener.
    pub fn destroy(&self) {
        self.inner
            .listeners
            .lock()
            .clear();
    }

    /// The currently installed setter.
    pub fn setter(&self) -> Arc<dyn Setter> {
        self.inner.setter.read().clone()
    }

    pub fn install_setter(&self, setter: Arc<dyn Setter>) {
        *self.inner.setter.write() = setter;
    }

    fn commit(&self, update: Update<'_>, mode: SetMode) {
        let previous = self.get_state();
        let next = update.resolve(&previous);
        let state = Arc::new(match mode {
            SetMode::Merge => previous.merged(&next),
            SetMode::Replace => next,
        });

        *self.inner.state.write() = state.clone();
        trace!("Committed state. mode: {:?}, state: {:?}", mode, state);

        // collected first, listeners may subscribe or unsubscribe while being notified
        let listeners = self
            .inner
            .listeners
            .lock()
            .values()
            .cloned()
            .collect::<Vec<_>>();

        for listener in listeners {
            listener(&state, &previous);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::state;
    use crate::value::Value;

    #[test]
    fn initial_state_is_the_initializer_result() {
        let store = Store::create(|_store| state! { "count" => 1 });

        assert_eq!(*store.get_state(), state! { "count" => 1 });
        assert!(Arc::ptr_eq(&store.get_state(), &store.get_initial_state()));
    }

    #[test]
    fn set_state_merges_and_replace_state_replaces() {
        let store = Store::create(|_store| state! { "count" => 1, "x" => 1 });

        store
            .set_state(state! { "count" => 2 })
            .unwrap();
        assert_eq!(*store.get_state(), state! { "count" => 2, "x" => 1 });

        store
            .replace_state(state! { "y" => 3 })
            .unwrap();
        assert_eq!(*store.get_state(), state! { "y" => 3 });
        assert_eq!(*store.get_initial_state(), state! { "count" => 1, "x" => 1 });
    }

    #[test]
    fn updater_receives_the_previous_state() {
        let store = Store::create(|_store| state! { "count" => 1 });

        store
            .set_state(Update::with(|state| {
                let count = state["count"]
                    .as_f64()
                    .unwrap();
                state! { "count" => count + 1.0 }
            }))
            .unwrap();

        assert_eq!(store.get_state()["count"].as_f64(), Some(2.0));
    }

    #[test]
    fn listeners_receive_state_and_previous_state() {
        let store = Store::create(|_store| state! { "count" => 1 });
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_in_listener = seen.clone();
        store.subscribe(move |state, previous| {
            seen_in_listener
                .lock()
                .push((state["count"].clone(), previous["count"].clone()));
        });

        store
            .set_state(state! { "count" => 2 })
            .unwrap();
        store
            .set_state(state! { "count" => 3 })
            .unwrap();

        assert_eq!(*seen.lock(), vec![
            (Value::from(2), Value::from(1)),
            (Value::from(3), Value::from(2))
        ]);
    }

    #[test]
    fn unsubscribed_and_destroyed_listeners_are_not_notified() {
        let store = Store::create(|_store| state! { "count" => 1 });
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = |calls: &Arc<AtomicUsize>| {
            let calls = calls.clone();
            move |_: &State, _: &State| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        };

        let first = store.subscribe(counter(&calls));
        store.subscribe(counter(&calls));

        assert!(store.unsubscribe(first));
        assert!(!store.unsubscribe(first));

        store
            .set_state(state! { "count" => 2 })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.destroy();
        store
            .set_state(state! { "count" => 3 })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_can_issue_nested_updates() {
        let store = Store::create(|_store| state! { "count" => 1, "echo" => 1 });

        let handle = store.clone();
        store.subscribe(move |state, _previous| {
            if !state["count"].is_identical(&state["echo"]) {
                handle
                    .set_state(state! { "echo" => state["count"].clone() })
                    .unwrap();
            }
        });

        store
            .set_state(state! { "count" => 5 })
            .unwrap();

        assert_eq!(*store.get_state(), state! { "count" => 5, "echo" => 5 });
    }

    struct Doubling {
        next: Arc<dyn Setter>,
    }

    impl Setter for Doubling {
        fn set(&self, store: &Store, update: Update<'_>, mode: SetMode) -> Result<(), StoreError> {
            let previous = store.get_state();
            let mut next = update.resolve(&previous);
            if let Some(count) = next
                .get("count")
                .and_then(|value| value.as_f64())
            {
                next.insert("count", count * 2.0);
            }
            self.next.set(store, Update::Value(next), mode)
        }
    }

    struct Rejecting;

    impl Setter for Rejecting {
        fn set(&self, _store: &Store, _update: Update<'_>, _mode: SetMode) -> Result<(), StoreError> {
            Err(StoreError::UpdateRejected(anyhow!("read only")))
        }
    }

    #[test]
    fn installed_setter_sees_every_update() {
        let store = Store::create(|store| {
            store.install_setter(Arc::new(Doubling {
                next: store.setter(),
            }));
            state! { "count" => 1 }
        });

        store
            .set_state(state! { "count" => 2 })
            .unwrap();

        assert_eq!(store.get_state()["count"].as_f64(), Some(4.0));
    }

    #[test]
    fn rejected_update_leaves_the_state_unchanged() {
        let store = Store::create(|store| {
            store.install_setter(Arc::new(Rejecting));
            state! { "count" => 1 }
        });
        let before = store.get_state();

        let result = store.set_state(state! { "count" => 2 });

        assert!(matches!(result, Err(StoreError::UpdateRejected(_))));
        assert!(Arc::ptr_eq(&before, &store.get_state()));
    }
}
