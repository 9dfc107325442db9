use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The three independent media collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Gifs,
    Images,
    Soundbites,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Gifs, MediaType::Images, MediaType::Soundbites];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gifs => "gifs",
            Self::Images => "images",
            Self::Soundbites => "soundbites",
        }
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gifs" => Ok(Self::Gifs),
            "images" => Ok(Self::Images),
            "soundbites" => Ok(Self::Soundbites),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub mime_type: String,
    pub size: i64,
    pub display_order: i64,
    pub uploaded_at: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_url: Option<String>,
    #[serde(skip)]
    pub storage_path: Option<String>,
}

/// All media grouped by collection, each list sorted by `display_order`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaLibrary {
    pub gifs: Vec<MediaItem>,
    pub images: Vec<MediaItem>,
    pub soundbites: Vec<MediaItem>,
}

impl MediaLibrary {
    pub fn list(&self, media_type: MediaType) -> &[MediaItem] {
        match media_type {
            MediaType::Gifs => &self.gifs,
            MediaType::Images => &self.images,
            MediaType::Soundbites => &self.soundbites,
        }
    }

    pub fn list_mut(&mut self, media_type: MediaType) -> &mut Vec<MediaItem> {
        match media_type {
            MediaType::Gifs => &mut self.gifs,
            MediaType::Images => &mut self.images,
            MediaType::Soundbites => &mut self.soundbites,
        }
    }

    pub fn len(&self) -> usize {
        self.gifs.len() + self.images.len() + self.soundbites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file received from a client, before it is stored.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub original_name: String,
    pub custom_name: Option<String>,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub source_url: Option<String>,
}

impl NewUpload {
    /// The custom name when it is non-blank, otherwise the original filename.
    pub fn display_name(&self) -> String {
        match self.custom_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.original_name.clone(),
        }
    }
}
