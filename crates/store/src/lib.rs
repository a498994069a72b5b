//! A key-value reactive state container.
//!
//! A [`Store`] holds the current [`State`], notifies subscribed listeners on every commit and routes every update
//! through a single replaceable [`Setter`], which is how layers such as derived fields intercept state transitions.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use store::{state, Store, Update};
//!
//! let store = Store::create(|_store| state! { "count" => 1 });
//!
//! let notified = Arc::new(AtomicUsize::new(0));
//! let notified_in_listener = notified.clone();
//! store.subscribe(move |_state, _previous| {
//!     notified_in_listener.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! store
//!     .set_state(Update::with(|state| {
//!         let count = state["count"].as_f64().unwrap_or_default();
//!         state! { "count" => count + 1.0 }
//!     }))
//!     .unwrap();
//!
//! assert_eq!(store.get_state()["count"].as_f64(), Some(2.0));
//! assert_eq!(notified.load(Ordering::SeqCst), 1);
//! ```

mod error;
mod state;
mod store;
mod update;
mod value;

pub use crate::error::StoreError;
pub use crate::state::State;
pub use crate::store::{ListenerKey, Setter, Store};
pub use crate::update::{SetMode, Update};
pub use crate::value::Value;
