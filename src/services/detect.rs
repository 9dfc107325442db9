use crate::models::MediaType;

const GENERIC_MIME: &str = "application/octet-stream";

/// Maps a MIME type onto its collection: audio is a soundbite, `image/gif`
/// is a GIF, any other image is an image.
pub fn detect_media_type(mime_type: &str) -> Option<MediaType> {
    let mime = essence(mime_type);
    if mime.starts_with("audio/") {
        Some(MediaType::Soundbites)
    } else if mime == "image/gif" {
        Some(MediaType::Gifs)
    } else if mime.starts_with("image/") {
        Some(MediaType::Images)
    } else {
        None
    }
}

/// Resolves the effective MIME type of an upload.
///
/// A specific declared type wins. Missing or generic declarations fall back
/// to the file's magic bytes, then to its extension.
pub fn sniff_mime(data: &[u8], declared: Option<&str>, filename: &str) -> String {
    if let Some(declared) = declared {
        let declared = essence(declared);
        if !declared.is_empty() && declared != GENERIC_MIME {
            return declared;
        }
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| GENERIC_MIME.to_string())
}

pub fn default_extension(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Soundbites => ".mp3",
        MediaType::Gifs => ".gif",
        MediaType::Images => ".jpg",
    }
}

/// Lowercased MIME type without parameters (`image/png; q=1` -> `image/png`).
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
