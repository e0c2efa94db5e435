use std::sync::Arc;

use eduadmin_api::UserInfo;
use serde::{Deserialize, Serialize};

use crate::storage::StorageBackend;
use crate::store::PersistedStore;

/// Storage key of the session store.
pub const USER_STORE_KEY: &str = "UserStore";

/// Session credential. `token` is empty when signed out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserState {
    pub user_info: Option<UserInfo>,
    pub token: String,
}

/// The signed-in user's credential, persisted under [`USER_STORE_KEY`].
#[derive(Clone)]
pub struct UserStore {
    store: PersistedStore<UserState>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: PersistedStore::new(USER_STORE_KEY, UserState::default(), backend),
        }
    }

    /// The underlying store, for subscriptions and hydration.
    pub fn store(&self) -> &PersistedStore<UserState> {
        &self.store
    }

    pub fn token(&self) -> String {
        self.store.read(|s| s.token.clone())
    }

    pub fn set_token(&self, token: &str) {
        self.store.set(|s| s.token = token.to_string());
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.store.read(|s| s.user_info.clone())
    }

    pub fn set_user_info(&self, user_info: UserInfo) {
        self.store.set(|s| s.user_info = Some(user_info));
    }

    pub fn login(&self, token: &str, user_info: Option<UserInfo>) {
        self.store.set(|s| {
            s.token = token.to_string();
            s.user_info = user_info;
        });
    }

    pub fn logout(&self) {
        self.store.set(|s| {
            s.token.clear();
            s.user_info = None;
        });
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.read(|s| !s.token.is_empty())
    }

    /// Drop the token, keeping the cached profile.
    ///
    /// Both the 401 handler and user-initiated sign-out land here, possibly at
    /// the same time. Clearing an empty token is a no-op; returns whether
    /// this call cleared it.
    pub fn clear_token(&self) -> bool {
        self.store.set_if(|s| {
            if s.token.is_empty() {
                return false;
            }
            s.token.clear();
            true
        })
    }
}
