//! Imports media by URL: download, detect, then store like a regular upload.

use super::detect::{default_extension, detect_media_type, sniff_mime};
use super::storage::{url_filename, FileStore};
use super::{media, ServiceError};
use crate::models::{MediaItem, MediaType, NewUpload};
use crate::Database;
use anyhow::Result;
use std::time::Duration;

#[derive(Debug)]
pub struct FetchedFile {
    pub filename: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub data: Vec<u8>,
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mediahub/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Downloads `url`, rejecting non-success responses, unsupported content
/// types and bodies larger than `max_bytes`.
pub async fn fetch_remote(client: &reqwest::Client, url: &str, max_bytes: usize) -> Result<FetchedFile> {
    let parsed = url::Url::parse(url.trim())
        .map_err(|e| ServiceError::invalid(format!("Invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ServiceError::invalid("Only http and https URLs are supported").into());
    }

    let mut response = client.get(parsed.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::invalid(format!(
            "Failed to fetch URL: {}",
            status.canonical_reason().unwrap_or(status.as_str())
        ))
        .into());
    }

    if let Some(length) = response.content_length() {
        if usize::try_from(length).map_or(true, |length| length > max_bytes) {
            return Err(ServiceError::TooLarge { max: max_bytes }.into());
        }
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut data = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if data.len() + chunk.len() > max_bytes {
            return Err(ServiceError::TooLarge { max: max_bytes }.into());
        }
        data.extend_from_slice(&chunk);
    }

    let raw_name = url_filename(&parsed);
    let mime_type = sniff_mime(&data, declared.as_deref(), raw_name.as_deref().unwrap_or(""));
    let media_type = detect_media_type(&mime_type).ok_or(ServiceError::UnsupportedType)?;

    let filename = match raw_name {
        Some(name) => name,
        None => format!("download{}", default_extension(media_type)),
    };

    Ok(FetchedFile {
        filename,
        mime_type,
        media_type,
        data,
    })
}

pub async fn upload_from_url(
    db: &Database,
    store: &FileStore,
    client: &reqwest::Client,
    url: &str,
    name: Option<String>,
    max_bytes: usize,
) -> Result<MediaItem> {
    let fetched = fetch_remote(client, url, max_bytes).await?;
    store_fetched(db, store, fetched, url, name, max_bytes)
}

/// Stores a downloaded file like a regular upload, remembering its source.
pub fn store_fetched(
    db: &Database,
    store: &FileStore,
    fetched: FetchedFile,
    url: &str,
    name: Option<String>,
    max_bytes: usize,
) -> Result<MediaItem> {
    tracing::info!(url = %url, media_type = %fetched.media_type, size = fetched.data.len(), "Fetched remote media");

    let upload = NewUpload {
        original_name: fetched.filename,
        custom_name: name,
        mime_type: fetched.mime_type,
        data: fetched.data,
        source_url: Some(url.trim().to_string()),
    };

    media::upload_media(db, store, max_bytes, upload)
}
