use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::lock;

/// Trailing-edge debounce: only the last value of a burst is dispatched,
/// once the quiet window has passed. Dropping the debouncer cancels the
/// pending dispatch.
pub struct Debouncer<T> {
    delay: Duration,
    callback: Arc<dyn Fn(T) + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            callback: Arc::new(callback),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the quiet window with `value`.
    pub fn call(&self, value: T) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; dispatching without debounce");
            self.cancel();
            (self.callback)(value);
            return;
        };

        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback(value);
        });
        if let Some(previous) = lock(&self.pending).replace(task) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(task) = lock(&self.pending).take() {
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.pending).take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |v: String| lock(&sink).push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_dispatches_only_last_value() {
        let (calls, callback) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300), callback);

        debouncer.call("a".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.call("ab".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.call("abc".to_string());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(lock(&calls).is_empty());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(lock(&calls).clone(), vec!["abc".to_string()]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn single_value_dispatches_after_window() {
        let (calls, callback) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300), callback);

        debouncer.call("a".to_string());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(lock(&calls).clone(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_stop_pending_dispatch() {
        let (calls, callback) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300), callback);
        debouncer.call("cancelled".to_string());
        debouncer.cancel();
        debouncer.call("dropped".to_string());
        drop(debouncer);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(lock(&calls).is_empty());
    }
}
