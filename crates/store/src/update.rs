use std::fmt;

use crate::state::State;

/// How a resolved update is applied to the current state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetMode {
    /// The fields of the update are written over the current state, other fields are kept.
    #[default]
    Merge,
    /// The update becomes the new state.
    Replace,
}

/// A state update, either a value or a function of the previous state.
pub enum Update<'a> {
    Value(State),
    With(Box<dyn FnOnce(&State) -> State + 'a>),
}

impl<'a> Update<'a> {
    pub fn with(updater: impl FnOnce(&State) -> State + 'a) -> Self {
        Update::With(Box::new(updater))
    }

    /// Resolves the update against the previous state, which is never modified.
    pub fn resolve(self, previous: &State) -> State {
        match self {
            Update::Value(state) => state,
            Update::With(updater) => updater(previous),
        }
    }
}

impl From<State> for Update<'_> {
    fn from(state: State) -> Self {
        Update::Value(state)
    }
}

impl fmt::Debug for Update<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Value(state) => f
                .debug_tuple("Value")
                .field(state)
                .finish(),
            Update::With(_) => f.write_str("With(..)"),
        }
    }
}
