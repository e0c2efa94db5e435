use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::StorageBackend;
use crate::store::PersistedStore;

/// Storage key of the table settings store.
pub const TABLE_SETTINGS_KEY: &str = "TableSettings";

/// Column id -> visible. Columns without an entry are visible.
pub type VisibilityState = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableSettings {
    /// Keyed by table id.
    pub column_visibility: BTreeMap<String, VisibilityState>,
}

/// Per-table column visibility, persisted under [`TABLE_SETTINGS_KEY`].
#[derive(Clone)]
pub struct TableSettingsStore {
    store: PersistedStore<TableSettings>,
}

impl TableSettingsStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: PersistedStore::new(TABLE_SETTINGS_KEY, TableSettings::default(), backend),
        }
    }

    pub fn store(&self) -> &PersistedStore<TableSettings> {
        &self.store
    }

    pub fn column_visibility(&self, table: &str) -> VisibilityState {
        self.store
            .read(|s| s.column_visibility.get(table).cloned().unwrap_or_default())
    }

    pub fn is_column_visible(&self, table: &str, column: &str) -> bool {
        self.store.read(|s| {
            s.column_visibility
                .get(table)
                .and_then(|columns| columns.get(column))
                .copied()
                .unwrap_or(true)
        })
    }

    pub fn set_column_visibility(&self, table: &str, visibility: VisibilityState) {
        self.store.set(|s| {
            s.column_visibility.insert(table.to_string(), visibility);
        });
    }

    pub fn toggle_column_visibility(&self, table: &str, column: &str, visible: bool) {
        self.store.set(|s| {
            s.column_visibility
                .entry(table.to_string())
                .or_default()
                .insert(column.to_string(), visible);
        });
    }

    pub fn reset_column_visibility(&self, table: &str) {
        self.store
            .set_if(|s| s.column_visibility.remove(table).is_some());
    }
}
