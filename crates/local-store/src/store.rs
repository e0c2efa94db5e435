use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::storage::StorageBackend;

/// On-disk shape of a store: the full state snapshot plus a schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord<S> {
    pub state: S,
    #[serde(default)]
    pub version: u32,
}

/// What `get()` returns and what listeners receive.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<S> {
    pub state: S,
    pub has_hydrated: bool,
}

type Listener<S> = Arc<dyn Fn(&Snapshot<S>) + Send + Sync>;

struct Versioned<S> {
    value: S,
    /// Bumped on every accepted `set`; orders write-through jobs.
    revision: u64,
}

struct Inner<S> {
    key: String,
    state: RwLock<Versioned<S>>,
    hydrated: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener<S>)>>,
    next_listener_id: AtomicU64,
    backend: Arc<dyn StorageBackend>,
    /// Revision last written to the backend. Held while writing.
    persisted_revision: Mutex<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Generic persisted state container.
///
/// Reads are synchronous against memory. Every accepted `set` notifies
/// subscribers and schedules a write-through job; jobs that lose a race to a
/// newer revision are skipped, so the backend always converges on the latest
/// state. Cloning yields another handle to the same store.
pub struct PersistedStore<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for PersistedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> PersistedStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(key: &str, initial: S, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: key.to_string(),
                state: RwLock::new(Versioned {
                    value: initial,
                    revision: 0,
                }),
                hydrated: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                backend,
                persisted_revision: Mutex::new(0),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn get(&self) -> Snapshot<S> {
        Snapshot {
            state: self.state(),
            has_hydrated: self.has_hydrated(),
        }
    }

    pub fn state(&self) -> S {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    /// Read a projection of the state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard.value)
    }

    pub fn has_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::SeqCst)
    }

    /// Apply a shallow update, notify subscribers, and schedule persistence.
    pub fn set(&self, update: impl FnOnce(&mut S)) {
        self.set_if(|state| {
            update(state);
            true
        });
    }

    /// Like [`set`](Self::set), but the closure reports whether it changed
    /// anything. Unchanged updates neither notify nor persist.
    pub fn set_if(&self, update: impl FnOnce(&mut S) -> bool) -> bool {
        let (snapshot, revision) = {
            let mut guard = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !update(&mut guard.value) {
                return false;
            }
            guard.revision += 1;
            (guard.value.clone(), guard.revision)
        };

        self.schedule_write(snapshot.clone(), revision);
        self.notify(&Snapshot {
            state: snapshot,
            has_hydrated: self.has_hydrated(),
        });
        true
    }

    /// Register a listener for every subsequent snapshot.
    pub fn subscribe(&self, listener: impl Fn(&Snapshot<S>) + Send + Sync + 'static) -> Subscription<S> {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Flip `has_hydrated` to true. Returns false (and does nothing) when it
    /// was already flipped.
    pub fn mark_hydrated(&self) -> bool {
        if self.inner.hydrated.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!(store = %self.inner.key, "store hydrated");
        self.notify(&self.get());
        true
    }

    /// Restore the persisted record, then flip `has_hydrated`.
    ///
    /// A missing record keeps the initial state. A record that fails to parse
    /// is logged and ignored. The flag is flipped in every case so waiters
    /// never hang; backend I/O errors are still returned.
    pub async fn hydrate(&self) -> Result<()> {
        let backend = Arc::clone(&self.inner.backend);
        let key = self.inner.key.clone();
        let loaded = tokio::task::spawn_blocking(move || backend.load(&key))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))
            .and_then(|res| res);
        let result = loaded.map(|raw| {
            if let Some(raw) = raw {
                self.restore(&raw);
            }
        });
        if let Err(e) = &result {
            warn!(store = %self.inner.key, "failed to load persisted state: {e}");
        }
        self.mark_hydrated();
        result
    }

    fn restore(&self, raw: &str) {
        match serde_json::from_str::<PersistedRecord<S>>(raw) {
            Ok(record) => {
                let mut guard = self
                    .inner
                    .state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                if guard.revision > 0 {
                    debug!(
                        store = %self.inner.key,
                        "state changed before hydration finished, keeping in-memory state"
                    );
                    return;
                }
                guard.value = record.state;
            }
            Err(e) => {
                warn!(store = %self.inner.key, "ignoring unreadable persisted state: {e}");
            }
        }
    }

    /// Resolve once the store has hydrated. Resolves immediately when it
    /// already has; otherwise installs a one-shot listener that is removed
    /// after it fires.
    pub async fn wait_for_hydration(&self) {
        if self.has_hydrated() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let subscription = self.subscribe(move |snapshot| {
            if snapshot.has_hydrated {
                if let Some(tx) = lock(&tx).take() {
                    let _ = tx.send(());
                }
            }
        });
        // The flag may have flipped between the first check and subscribing.
        if !self.has_hydrated() {
            let _ = rx.await;
        }
        subscription.unsubscribe();
    }

    /// Write the latest state now and wait for it to land.
    pub async fn flush(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.write_latest())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn schedule_write(&self, snapshot: S, revision: u64) {
        let inner = Arc::clone(&self.inner);
        let job = move || {
            if let Err(e) = inner.write_revision(&snapshot, revision) {
                warn!(store = %inner.key, "failed to persist state: {e}");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }

    fn notify(&self, snapshot: &Snapshot<S>) {
        // Copy out first so listeners may (un)subscribe from inside a callback.
        let listeners: Vec<Listener<S>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl<S> Inner<S>
where
    S: Clone + Serialize,
{
    fn write_revision(&self, state: &S, revision: u64) -> Result<()> {
        let mut persisted = lock(&self.persisted_revision);
        if revision <= *persisted {
            debug!(store = %self.key, revision, "skipping stale write");
            return Ok(());
        }
        let raw = serde_json::to_string(&PersistedRecord {
            state: state.clone(),
            version: 0,
        })?;
        self.backend.save(&self.key, &raw)?;
        *persisted = revision;
        debug!(store = %self.key, revision, "state persisted");
        Ok(())
    }

    fn write_latest(&self) -> Result<()> {
        let (state, revision) = {
            let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
            (guard.value.clone(), guard.revision)
        };
        self.write_revision(&state, revision)
    }
}

/// Handle returned by [`PersistedStore::subscribe`]. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) removes the listener.
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription<S> {
    id: u64,
    inner: Weak<Inner<S>>,
}

impl<S> Subscription<S> {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<S> Drop for Subscription<S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Counter {
        count: u32,
        label: String,
    }

    fn memory_store() -> (PersistedStore<Counter>, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        let store = PersistedStore::new("Counter", Counter::default(), backend.clone());
        (store, backend)
    }

    #[test]
    fn set_merges_and_notifies_synchronously() {
        let (store, _backend) = memory_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |snap| lock(&sink).push(snap.state.count));

        store.set(|s| s.count = 1);
        store.set(|s| s.label = "x".to_string());

        assert_eq!(store.get().state, Counter { count: 1, label: "x".to_string() });
        assert_eq!(*lock(&seen), vec![1, 1]);

        sub.unsubscribe();
        store.set(|s| s.count = 2);
        assert_eq!(*lock(&seen), vec![1, 1]);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn unchanged_update_is_silent() {
        let (store, backend) = memory_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.set_if(|_| false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.get("Counter"), None);
    }

    #[test]
    fn without_runtime_writes_happen_inline() {
        let (store, backend) = memory_store();
        store.set(|s| s.count = 7);
        let raw = backend.get("Counter").expect("persisted");
        let record: PersistedRecord<Counter> = serde_json::from_str(&raw).expect("record");
        assert_eq!(record.state.count, 7);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let (store, _backend) = memory_store();
        let slot: Arc<Mutex<Option<Subscription<Counter>>>> = Arc::new(Mutex::new(None));
        let inner_slot = Arc::clone(&slot);
        let sub = store.subscribe(move |_| {
            lock(&inner_slot).take();
        });
        *lock(&slot) = Some(sub);

        store.set(|s| s.count = 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn flush_persists_latest_revision() {
        let (store, backend) = memory_store();
        for i in 0..20 {
            store.set(|s| s.count = i);
        }
        store.flush().await.expect("flush");

        let raw = backend.get("Counter").expect("persisted");
        let record: PersistedRecord<Counter> = serde_json::from_str(&raw).expect("record");
        assert_eq!(record.state.count, 19);
    }

    #[tokio::test]
    async fn hydrate_restores_persisted_state() {
        let backend = Arc::new(
            MemoryStorage::new().with_entry("Counter", r#"{"state":{"count":5},"version":0}"#),
        );
        let store = PersistedStore::new("Counter", Counter::default(), backend);
        assert!(!store.has_hydrated());

        store.hydrate().await.expect("hydrate");
        assert!(store.has_hydrated());
        assert_eq!(store.state().count, 5);
        assert_eq!(store.state().label, "");
    }

    #[tokio::test]
    async fn hydrate_ignores_corrupt_record_and_still_flips() {
        let backend = Arc::new(MemoryStorage::new().with_entry("Counter", "{not json"));
        let store = PersistedStore::new("Counter", Counter::default(), backend);

        store.hydrate().await.expect("corrupt records are not fatal");
        assert!(store.has_hydrated());
        assert_eq!(store.state(), Counter::default());
    }

    #[tokio::test]
    async fn wait_for_hydration_resolves_immediately_when_hydrated() {
        let (store, _backend) = memory_store();
        store.mark_hydrated();
        tokio::time::timeout(Duration::from_millis(50), store.wait_for_hydration())
            .await
            .expect("should resolve immediately");
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_hydration_resolves_once_after_flip() {
        let (store, _backend) = memory_store();
        let flips = Arc::new(AtomicUsize::new(0));
        let flip_counter = Arc::clone(&flips);
        let _watch = store.subscribe(move |snap| {
            if snap.has_hydrated {
                flip_counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for_hydration().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(store.mark_hydrated());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter resolves")
            .expect("waiter task");

        assert!(!store.mark_hydrated());
        assert_eq!(flips.load(Ordering::SeqCst), 1);
        // Only the test's own listener remains.
        assert_eq!(store.listener_count(), 1);
    }
}
