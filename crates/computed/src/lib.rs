//! Derived fields for [`store::Store`].
//!
//! A derivation function computes extra fields from the store's base fields. The fields are merged into the state on
//! creation and after every update, recomputed only when the configured policy says the update warrants it, and a
//! recomputed value that compares equal to the previous one keeps the previous instance.
//!
//! # Example
//!
//! ```rust
//! use computed::{create_computed, ComputedOptions};
//! use store::state;
//!
//! let store = create_computed(
//!     |_store| state! { "count" => 2, "label" => "two" },
//!     |state| {
//!         let count = state.number("count")?;
//!         Ok(state! { "countSq" => count * count })
//!     },
//!     ComputedOptions::new().keys(["count"]),
//! )
//! .unwrap();
//!
//! assert_eq!(store.get_state()["countSq"].as_f64(), Some(4.0));
//!
//! store.set_state(state! { "count" => 3 }).unwrap();
//! assert_eq!(store.get_state()["countSq"].as_f64(), Some(9.0));
//! ```

mod derive;
mod equality;
mod error;
mod interceptor;
mod merge;
mod options;
mod recompute;

pub use crate::derive::Snapshot;
pub use crate::equality::{deep, never, shallow, EqualityFn, EqualityKind};
pub use crate::error::ComputedError;
pub use crate::interceptor::{computed, create_computed};
pub use crate::merge::{carry_over, merge_computed};
pub use crate::options::{ComputedConfig, ComputedOptions};
pub use crate::recompute::{RecomputeFn, RecomputePolicy, TrackedKeys};
