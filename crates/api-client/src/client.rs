use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eduadmin_api::Envelope;
use eduadmin_local_store::UserStore;
use eduadmin_runtime_config::{AdminConfig, normalize_prefix};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::notify::{Navigator, Notifier, TracingNavigator, TracingNotifier};

/// Query value for requests without parameters.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Connection and session-handling settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub origin: String,
    pub api_prefix: String,
    pub oss_proxy_prefix: String,
    pub timeout: Duration,
    pub sign_in_path: String,
    pub redirect_delay: Duration,
}

impl ClientSettings {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            origin: config.server.origin.trim_end_matches('/').to_string(),
            api_prefix: normalize_prefix(&config.server.api_prefix),
            oss_proxy_prefix: normalize_prefix(&config.server.oss_proxy_prefix),
            timeout: config.server.timeout(),
            sign_in_path: config.session.sign_in_path.clone(),
            redirect_delay: config.session.redirect_delay(),
        }
    }

    /// Defaults pointed at another origin (tests, one-off scripts).
    pub fn for_origin(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&AdminConfig::default())
    }
}

/// The single request pipeline of the console.
///
/// Every request picks up the bearer token from the injected [`UserStore`],
/// and every response goes through envelope unwrapping and failure
/// classification. Failures are notified through the [`Notifier`] before they
/// are returned. Cloning is cheap and shares the connection pool and the
/// pending-redirect latch.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
    base_url: String,
    user_store: UserStore,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    redirect_pending: Arc<AtomicBool>,
    redirect_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ApiClient {
    pub fn new(settings: ClientSettings, user_store: UserStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ApiError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, settings, user_store))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(http: reqwest::Client, settings: ClientSettings, user_store: UserStore) -> Self {
        let base_url = format!("{}{}", settings.origin, settings.api_prefix);
        Self {
            http,
            settings: Arc::new(settings),
            base_url,
            user_store,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
            redirect_pending: Arc::new(AtomicBool::new(false)),
            redirect_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn user_store(&self) -> &UserStore {
        &self.user_store
    }

    /// Access the underlying `reqwest::Client`.
    pub fn reqwest_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Wait until a scheduled sign-in redirect has been delivered. Returns
    /// at once when none is pending. Short-lived processes call this before
    /// exiting so the redirect is not lost.
    pub async fn wait_for_redirect(&self) {
        let task = self
            .redirect_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("sign-in redirect task failed: {e}");
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ── Verb wrappers ─────────────────────────────────────────────────────

    /// GET returning only the unwrapped `data`.
    pub async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let req = self.http.get(self.url(path)).query(query);
        Ok(self.execute(req, "GET", path).await?.data)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let req = self.http.post(self.url(path)).json(body);
        Ok(self.execute(req, "POST", path).await?.data)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let req = self.http.put(self.url(path)).json(body);
        Ok(self.execute(req, "PUT", path).await?.data)
    }

    pub async fn delete<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let req = self.http.delete(self.url(path));
        Ok(self.execute(req, "DELETE", path).await?.data)
    }

    /// GET returning the whole envelope, for callers that need `message` or
    /// `timestamp` alongside the payload.
    pub async fn get_full_response<T, Q>(&self, path: &str, query: &Q) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let req = self.http.get(self.url(path)).query(query);
        self.execute(req, "GET", path).await
    }

    // ── Pipeline ──────────────────────────────────────────────────────────

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.user_store.token();
        if token.is_empty() {
            req
        } else {
            req.bearer_auth(token)
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        path: &str,
    ) -> Result<Envelope<T>> {
        debug!("{method} {path}");
        let outcome = self.dispatch(self.authorize(req)).await;
        if let Err(e) = &outcome {
            debug!("{method} {path} failed: {e:?}");
            self.report(e);
        }
        outcome
    }

    async fn dispatch<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<Envelope<T>> {
        let resp = req.send().await.map_err(|e| ApiError::from_transport(&e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let bytes = resp.bytes().await.map_err(|e| ApiError::from_transport(&e))?;
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::Client(format!("invalid response: {e}")))?;
        if !envelope.is_success() {
            return Err(ApiError::application(envelope.code, &envelope.message));
        }

        let data = serde_json::from_value(envelope.data)
            .map_err(|e| ApiError::Client(format!("invalid response data: {e}")))?;
        Ok(Envelope {
            code: envelope.code,
            message: envelope.message,
            timestamp: envelope.timestamp,
            data,
        })
    }

    /// Side effects of a failed request: notification, and for 401 the
    /// credential clear plus a delayed redirect.
    fn report(&self, err: &ApiError) {
        if err.is_unauthorized() {
            self.expire_session();
        } else {
            self.notifier.error(&err.user_message());
        }
    }

    /// Clear the credential and schedule the sign-in redirect. While a
    /// redirect is pending, further 401s only re-clear (a no-op).
    fn expire_session(&self) {
        self.user_store.clear_token();
        if self.redirect_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notifier.error(&ApiError::Unauthorized.user_message());

        let navigator = Arc::clone(&self.navigator);
        let pending = Arc::clone(&self.redirect_pending);
        let delay = self.settings.redirect_delay;
        let path = self.settings.sign_in_path.clone();
        let redirect = async move {
            // Let the current response finish unwinding before navigating.
            tokio::time::sleep(delay).await;
            navigator.redirect(&path);
            pending.store(false, Ordering::SeqCst);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(redirect);
                *self
                    .redirect_task
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(task);
            }
            Err(_) => {
                warn!("no async runtime; redirecting immediately");
                self.navigator.redirect(&self.settings.sign_in_path);
                self.redirect_pending.store(false, Ordering::SeqCst);
            }
        }
    }
}
