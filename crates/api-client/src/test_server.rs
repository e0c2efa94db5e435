//! In-process backend for tests.

use axum::{Json, Router};
use serde_json::{Value, json};

/// Serve `router` on an ephemeral local port and return its origin.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve test router");
    });
    format!("http://{addr}")
}

/// Successful envelope around `data`.
pub fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "code": 0,
        "message": "success",
        "timestamp": "2026-10-19T08:00:00.000Z",
        "data": data,
    }))
}
