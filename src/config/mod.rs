use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prebuilt browser client. When set, non-API paths are served from it
    /// with an `index.html` fallback.
    #[serde(default)]
    pub client_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    /// Prefix for file URLs handed to clients, e.g. `https://media.example.com`.
    /// Empty means URLs are relative to this server.
    #[serde(default)]
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload")]
    pub max_upload_size: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl UploadConfig {
    pub fn max_upload_bytes(&self) -> Result<usize> {
        parse_size(&self.max_upload_size)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins. An empty list allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_pool_size() -> u32 {
    10
}

fn default_max_upload() -> String {
    "50MB".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    256
}

fn default_keep_alive() -> u64 {
    30
}

/// Parses sizes such as `512`, `64KB`, `10MB` or `1GB` into bytes.
pub fn parse_size(input: &str) -> Result<usize> {
    let trimmed = input.trim().to_ascii_uppercase();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        anyhow::bail!("Invalid size '{}': expected a number", input);
    }
    let value: usize = digits.parse()?;

    let multiplier = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Invalid size unit '{}' in '{}'", other, input),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size '{}' is too large", input))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Could not read config file '{}': {}. Run 'mediahub init' first?",
                path.display(),
                e
            )
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }
        if self.storage.upload_dir.trim().is_empty() {
            anyhow::bail!("storage.upload_dir must not be empty");
        }
        if self.uploads.max_upload_bytes()? == 0 {
            anyhow::bail!("uploads.max_upload_size must be greater than 0");
        }
        if self.uploads.fetch_timeout_secs == 0 {
            anyhow::bail!("uploads.fetch_timeout_secs must be greater than 0");
        }
        if self.realtime.channel_capacity == 0 {
            anyhow::bail!("realtime.channel_capacity must be greater than 0");
        }
        if self.realtime.keep_alive_secs == 0 {
            anyhow::bail!("realtime.keep_alive_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
