use anyhow::{Context, Result, bail};
use bytes::Bytes;
use eduadmin_api_client::{ProgressFn, UploadPolicy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::context::AppContext;

pub async fn run_upload(ctx: &AppContext, file: &Path, accept: Vec<String>, max_size_mb: u64) -> Result<()> {
    if !file.exists() {
        bail!("File not found: {}", file.display());
    }
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Unusable file name: {}", file.display()))?;

    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let policy = UploadPolicy {
        max_size_mb,
        ..UploadPolicy::accepting(accept)
    };

    let on_progress: ProgressFn = Arc::new(|percent| {
        eprint!("\rUploading... {percent:>3}%");
        let _ = std::io::stderr().flush();
    });
    let uploaded = ctx
        .client
        .upload_file(file_name, Bytes::from(body), &policy, Some(on_progress))
        .await;
    eprintln!();

    let uploaded = uploaded.with_context(|| format!("Upload of {file_name} failed"))?;
    println!("{}", uploaded.file_url);
    Ok(())
}
