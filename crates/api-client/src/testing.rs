//! Recording notifier/navigator and a ready-made client for tests.

use std::sync::{Arc, Mutex, PoisonError};

use eduadmin_local_store::{MemoryStorage, UserStore};

use crate::client::{ApiClient, ClientSettings};
use crate::notify::{Navigator, Notifier};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

/// A client wired to an in-memory user store and recording seams.
pub struct TestHarness {
    pub client: ApiClient,
    pub user_store: UserStore,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
}

impl TestHarness {
    pub fn new(origin: &str) -> Self {
        Self::with_settings(ClientSettings::for_origin(origin))
    }

    pub fn with_settings(settings: ClientSettings) -> Self {
        let user_store = UserStore::new(Arc::new(MemoryStorage::new()));
        user_store.store().mark_hydrated();
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::new(settings, user_store.clone())
            .expect("build test client")
            .with_notifier(notifier.clone())
            .with_navigator(navigator.clone());
        Self {
            client,
            user_store,
            notifier,
            navigator,
        }
    }
}
