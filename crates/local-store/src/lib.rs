//! Persisted client-side stores for the eduadmin console.
//!
//! [`PersistedStore`] is a generic state container with synchronous reads,
//! fire-and-forget write-through to a [`StorageBackend`], subscriptions, and a
//! one-time hydration signal. [`UserStore`] and [`TableSettingsStore`] are the
//! two named stores the console keeps on disk.

mod error;
mod storage;
mod store;
mod table_settings;
mod user;

pub use error::{Result, StoreError};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{PersistedRecord, PersistedStore, Snapshot, Subscription};
pub use table_settings::{TABLE_SETTINGS_KEY, TableSettings, TableSettingsStore, VisibilityState};
pub use user::{USER_STORE_KEY, UserState, UserStore};
