//! Selection and search building blocks shared by the console's pickers and
//! list toolbars.
//!
//! A [`Resolver`] owns the state of one picker: the selected identifier, the
//! entity it resolves to, the search text and the current candidate list.
//! Candidates come from an [`EntitySource`], normally a [`RemoteListSource`]
//! over one list endpoint. [`Toolbar`] coalesces keystrokes through a
//! [`Debouncer`] before they reach a list query.

mod candidate;
mod debounce;
mod resolver;
mod source;
mod toolbar;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use candidate::{Candidate, UNNAMED};
pub use debounce::Debouncer;
pub use resolver::{ChangeFn, DisplayFn, Phase, Resolver, SelectionState};
pub use source::{EntitySource, RemoteListSource, SearchQuery};
pub use toolbar::{ALL, FilterOption, Toolbar, ToolbarFilter};

/// A panic while holding one of these locks leaves plain data behind, so a
/// poisoned lock is used as is.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
