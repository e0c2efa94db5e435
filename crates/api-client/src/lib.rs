pub mod client;
pub mod endpoints;
pub mod error;
pub mod notify;
pub mod upload;

#[cfg(test)]
mod test_server;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ApiClient, ClientSettings, NO_QUERY};
pub use eduadmin_api;
pub use error::{ApiError, GENERIC_FAILURE, Result};
pub use notify::{Navigator, Notifier, TracingNavigator, TracingNotifier};
pub use upload::{
    DEFAULT_MAX_SIZE_MB, ProgressFn, UploadError, UploadPolicy, UploadedFile, extension_of,
    progress_percent, proxy_upload_url,
};
