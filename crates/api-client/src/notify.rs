//! Seams to the presentation layer: user-facing notifications and navigation.

use tracing::{info, warn};

/// Surfaces a user-facing message (a toast in the console UI).
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Moves the user to another entry point (the sign-in page after a 401).
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Default notifier: user-facing messages become `warn!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        warn!(target: "eduadmin::notify", "{message}");
    }
}

/// Default navigator for headless use: logs the redirect target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect(&self, path: &str) {
        info!(target: "eduadmin::navigate", "redirect to {path}");
    }
}
