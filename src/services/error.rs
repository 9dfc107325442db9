use thiserror::Error;

/// Failures the caller can act on. Anything else travels as a plain
/// `anyhow::Error` and is reported as an internal error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unsupported file type. Only audio, GIF, or image files are allowed")]
    UnsupportedType,
    #[error("File too large (max {max} bytes)")]
    TooLarge { max: usize },
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Trims a user-supplied name and rejects blank input.
pub fn clean_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("Name is required"));
    }
    Ok(trimmed.to_string())
}
