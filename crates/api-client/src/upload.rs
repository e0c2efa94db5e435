//! Direct-to-object-storage uploads.
//!
//! The backend hands out a pre-signed URL; the bytes are then PUT through a
//! same-origin proxy path so the browser-era CORS restrictions of the bucket
//! never apply.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use eduadmin_api::{UploadUrlQuery, UploadUrlResponse};
use reqwest::header::CONTENT_LENGTH;
use tracing::debug;
use url::Url;

use crate::client::ApiClient;
use crate::error::{ApiError, Result};

pub const UPLOAD_URL_PATH: &str = "/admin/course/upload-url";

/// Default upper bound on a single file.
pub const DEFAULT_MAX_SIZE_MB: u64 = 500;

const CHUNK_SIZE: usize = 64 * 1024;

/// Receives integer upload progress, 0 to 100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Rewrite a pre-signed URL onto the local proxy:
/// `https://bucket.oss.example.com/a/b.jpg?sig=1` -> `<origin><prefix>/a/b.jpg?sig=1`.
pub fn proxy_upload_url(origin: &str, proxy_prefix: &str, upload_url: &str) -> Result<String> {
    let parsed = Url::parse(upload_url)
        .map_err(|e| ApiError::Client(format!("invalid upload url {upload_url}: {e}")))?;
    let mut proxied = format!(
        "{}{}{}",
        origin.trim_end_matches('/'),
        proxy_prefix,
        parsed.path()
    );
    if let Some(query) = parsed.query() {
        proxied.push('?');
        proxied.push_str(query);
    }
    Ok(proxied)
}

/// `round(sent / total * 100)`, or `None` when the total is unknown.
pub fn progress_percent(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let sent = sent.min(total);
    // Integer rounding of sent * 100 / total.
    let percent = (sent * 200 + total) / (total * 2);
    u8::try_from(percent).ok()
}

fn progress_body(body: Bytes, on_progress: Option<ProgressFn>) -> reqwest::Body {
    let total = body.len() as u64;
    let chunks: Vec<Bytes> = (0..body.len())
        .step_by(CHUNK_SIZE)
        .map(|start| body.slice(start..(start + CHUNK_SIZE).min(body.len())))
        .collect();

    let mut sent = 0u64;
    let mut last_reported = None;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let (Some(report), Some(percent)) = (&on_progress, progress_percent(sent, total)) {
            if last_reported != Some(percent) {
                last_reported = Some(percent);
                report(percent);
            }
        }
        Ok::<_, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

/// Client-side checks applied before asking for an upload URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Allowed extensions such as `.jpg`. Empty allows everything.
    pub accept: Vec<String>,
    pub max_size_mb: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            accept: Vec::new(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
        }
    }
}

impl UploadPolicy {
    pub fn accepting<I, S>(accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accept: accept
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
            ..Self::default()
        }
    }

    /// Validate a file and return its type string (extension without the dot).
    pub fn check(&self, file_name: &str, size: u64) -> std::result::Result<String, String> {
        let ext = extension_of(file_name)
            .ok_or_else(|| format!("{file_name} has no file extension"))?;
        if !self.accept.is_empty() && !self.accept.iter().any(|allowed| *allowed == ext) {
            return Err(format!("please upload {} files", self.accept.join(", ")));
        }
        if size > self.max_size_mb.saturating_mul(1024 * 1024) {
            return Err(format!("file size cannot exceed {}MB", self.max_size_mb));
        }
        Ok(ext.trim_start_matches('.').to_string())
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

/// Lowercase extension with its leading dot, e.g. `.png`.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Failed the local policy check; nothing was sent.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Public URL to store on the owning record.
    pub file_url: String,
    pub object_key: String,
    pub file_type: String,
    pub size: u64,
}

impl ApiClient {
    /// Ask the backend for a pre-signed upload target.
    pub async fn get_upload_url(&self, file_type: &str) -> Result<UploadUrlResponse> {
        self.get(
            UPLOAD_URL_PATH,
            &UploadUrlQuery {
                file_type: file_type.to_string(),
            },
        )
        .await
    }

    /// PUT raw bytes to a pre-signed URL through the same-origin proxy.
    ///
    /// No bearer token is attached and storage-side statuses never touch the
    /// session; failures are still notified and returned.
    pub async fn upload_to_oss(
        &self,
        upload_url: &str,
        body: Bytes,
        headers: &HashMap<String, String>,
        on_progress: Option<ProgressFn>,
    ) -> Result<()> {
        let outcome = self.put_object(upload_url, body, headers, on_progress).await;
        if let Err(e) = &outcome {
            self.notifier().error(&e.user_message());
        }
        outcome
    }

    async fn put_object(
        &self,
        upload_url: &str,
        body: Bytes,
        headers: &HashMap<String, String>,
        on_progress: Option<ProgressFn>,
    ) -> Result<()> {
        let settings = self.settings();
        let target = proxy_upload_url(&settings.origin, &settings.oss_proxy_prefix, upload_url)?;
        debug!("PUT {target} ({} bytes)", body.len());

        let mut req = self
            .reqwest_client()
            .put(&target)
            .header(CONTENT_LENGTH, body.len());
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req
            .body(progress_body(body, on_progress))
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: format!("upload failed ({})", status.as_u16()),
            });
        }
        Ok(())
    }

    /// Full upload flow: policy check, upload URL handshake, proxied PUT.
    pub async fn upload_file(
        &self,
        file_name: &str,
        body: Bytes,
        policy: &UploadPolicy,
        on_progress: Option<ProgressFn>,
    ) -> std::result::Result<UploadedFile, UploadError> {
        let size = body.len() as u64;
        let file_type = match policy.check(file_name, size) {
            Ok(file_type) => file_type,
            Err(reason) => {
                self.notifier().error(&reason);
                return Err(UploadError::Rejected(reason));
            }
        };

        let target = self.get_upload_url(&file_type).await?;
        self.upload_to_oss(&target.upload_url, body, &target.headers, on_progress)
            .await?;
        Ok(UploadedFile {
            file_url: target.file_url,
            object_key: target.object_key,
            file_type,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{envelope, spawn};
    use crate::testing::TestHarness;
    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, put};
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn rewrites_presigned_url_onto_proxy() {
        let url = proxy_upload_url(
            "http://localhost:5173/",
            "/proxyOss",
            "https://bucket.oss-cn-beijing.aliyuncs.com/course/a.jpg?Expires=1&Signature=x%2By",
        )
        .expect("rewrite");
        assert_eq!(
            url,
            "http://localhost:5173/proxyOss/course/a.jpg?Expires=1&Signature=x%2By"
        );

        let no_query = proxy_upload_url("http://h", "/p", "https://b.example.com/k").expect("rewrite");
        assert_eq!(no_query, "http://h/p/k");

        assert!(matches!(
            proxy_upload_url("http://h", "/p", "not a url"),
            Err(ApiError::Client(_))
        ));
    }

    #[test]
    fn progress_is_rounded_integer_percent() {
        assert_eq!(progress_percent(0, 0), None);
        assert_eq!(progress_percent(0, 10), Some(0));
        assert_eq!(progress_percent(1, 3), Some(33));
        assert_eq!(progress_percent(2, 3), Some(67));
        assert_eq!(progress_percent(1, 200), Some(1));
        assert_eq!(progress_percent(10, 10), Some(100));
        assert_eq!(progress_percent(11, 10), Some(100));
    }

    #[test]
    fn policy_checks_extension_and_size() {
        let policy = UploadPolicy::accepting(["jpg", ".PNG"]);
        assert_eq!(policy.accept, vec![".jpg".to_string(), ".png".to_string()]);
        assert_eq!(policy.check("Cover.JPG", 10), Ok("jpg".to_string()));
        assert_eq!(policy.check("cover.png", 10), Ok("png".to_string()));
        assert!(policy.check("cover.gif", 10).is_err());
        assert!(policy.check("README", 10).is_err());

        let small = UploadPolicy {
            max_size_mb: 1,
            ..UploadPolicy::default()
        };
        assert_eq!(small.check("notes.pdf", 1024 * 1024), Ok("pdf".to_string()));
        assert_eq!(
            small.check("notes.pdf", 1024 * 1024 + 1),
            Err("file size cannot exceed 1MB".to_string())
        );
    }

    #[derive(Default)]
    struct Received {
        len: usize,
        signature: Option<String>,
        content_type: Option<String>,
        authorization: Option<String>,
    }

    type Shared = Arc<Mutex<Received>>;

    async fn accept_object(
        State(received): State<Shared>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        let mut r = received.lock().expect("lock");
        r.len = body.len();
        r.signature = query.get("Signature").cloned();
        r.content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        r.authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        StatusCode::OK
    }

    #[tokio::test]
    async fn upload_file_runs_handshake_and_reports_progress() {
        let received: Shared = Arc::default();
        let router = Router::new()
            .route(
                "/api/admin/course/upload-url",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let ft = q.get("fileType").cloned().unwrap_or_default();
                    envelope(json!({
                        "uploadUrl": format!("https://bucket.oss.example.com/course/cover.{ft}?Signature=abc"),
                        "fileUrl": format!("https://cdn.example.com/course/cover.{ft}"),
                        "objectKey": format!("course/cover.{ft}"),
                        "headers": { "Content-Type": "image/png" }
                    }))
                }),
            )
            .route("/proxyOss/course/cover.png", put(accept_object))
            .with_state(received.clone());
        let origin = spawn(router).await;
        let h = TestHarness::new(&origin);
        h.user_store.set_token("session-token");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_progress: ProgressFn = Arc::new(move |p| sink.lock().expect("lock").push(p));

        let body = Bytes::from(vec![7u8; 200_000]);
        let uploaded = h
            .client
            .upload_file("cover.PNG", body, &UploadPolicy::accepting([".png"]), Some(on_progress))
            .await
            .expect("upload");

        assert_eq!(uploaded.file_url, "https://cdn.example.com/course/cover.png");
        assert_eq!(uploaded.object_key, "course/cover.png");
        assert_eq!(uploaded.size, 200_000);

        let r = received.lock().expect("lock");
        assert_eq!(r.len, 200_000);
        assert_eq!(r.signature.as_deref(), Some("abc"));
        assert_eq!(r.content_type.as_deref(), Some("image/png"));
        assert_eq!(r.authorization, None);

        let seen = seen.lock().expect("lock").clone();
        assert!(seen.len() >= 2, "progress: {seen:?}");
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "progress: {seen:?}");
        assert_eq!(seen.last(), Some(&100));
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn rejected_file_is_notified_and_never_sent() {
        let h = TestHarness::new("http://127.0.0.1:1");
        let err = h
            .client
            .upload_file("virus.exe", Bytes::from_static(b"MZ"), &UploadPolicy::accepting([".pdf"]), None)
            .await
            .expect_err("rejected");
        assert!(matches!(err, UploadError::Rejected(_)));
        assert_eq!(h.notifier.messages(), vec!["please upload .pdf files".to_string()]);
    }

    #[tokio::test]
    async fn storage_rejection_does_not_touch_session() {
        let router = Router::new().route(
            "/proxyOss/k.bin",
            put(|| async { StatusCode::FORBIDDEN }),
        );
        let origin = spawn(router).await;
        let h = TestHarness::new(&origin);
        h.user_store.set_token("keep");

        let err = h
            .client
            .upload_to_oss(
                "https://bucket.example.com/k.bin?Signature=expired",
                Bytes::from_static(b"data"),
                &HashMap::new(),
                None,
            )
            .await
            .expect_err("403 from storage");
        assert_eq!(err.status(), Some(403));
        assert_eq!(h.user_store.token(), "keep");
        assert_eq!(h.notifier.messages(), vec!["upload failed (403)".to_string()]);
        assert!(h.navigator.redirects().is_empty());
    }
}
