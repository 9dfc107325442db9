use crate::models::MediaType;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

const MAX_NAME_LEN: usize = 100;

/// Uploaded binaries on local disk, one subdirectory per media type.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for media_type in MediaType::ALL {
            std::fs::create_dir_all(self.root.join(media_type.as_str()))?;
        }
        Ok(())
    }

    /// Writes the bytes and returns the storage path relative to the root.
    pub fn save(&self, media_type: MediaType, original_name: &str, data: &[u8]) -> Result<String> {
        let dir = self.root.join(media_type.as_str());
        std::fs::create_dir_all(&dir)?;

        let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(original_name));
        std::fs::write(dir.join(&filename), data)?;

        Ok(format!("{}/{}", media_type.as_str(), filename))
    }

    /// Maps a relative storage path to a file under the root, refusing
    /// anything that could escape it.
    pub fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_path);
        let safe = !storage_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            bail!("Invalid storage path: {}", storage_path);
        }
        Ok(self.root.join(relative))
    }

    pub fn remove(&self, storage_path: &str) -> Result<()> {
        let path = self.resolve(storage_path)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn public_url(&self, storage_path: &str) -> String {
        format!("{}/files/{}", self.public_base_url, storage_path)
    }
}

/// Last path segment of the URL, percent-decoded. `None` when the path ends
/// in a slash or is empty.
pub fn url_filename(url: &url::Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}

/// Reduces a client filename to a safe, bounded ASCII name.
pub fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        return "file".to_string();
    }

    // Only ASCII survives the regex, so byte slicing is safe.
    let start = cleaned.len().saturating_sub(MAX_NAME_LEN);
    cleaned[start..].to_string()
}
