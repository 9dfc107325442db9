use crate::services::realtime::Broadcaster;
use crate::services::storage::FileStore;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;
#[cfg(feature = "remote-upload")]
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::services::{ServeDir, ServeFile};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub store: FileStore,
    pub broadcaster: Broadcaster,
    pub max_upload_bytes: usize,
    /// Held from a write's commit through its broadcast, so viewers receive
    /// changes in the order the database applied them.
    pub write_lock: Mutex<()>,
    /// Prebuilt browser client with `index.html` fallback.
    pub client: Option<ServeDir<ServeFile>>,
    #[cfg(feature = "remote-upload")]
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let store = FileStore::new(&config.storage.upload_dir, &config.storage.public_base_url);
        store.ensure_dirs()?;

        let broadcaster = Broadcaster::new(config.realtime.channel_capacity);
        let max_upload_bytes = config.uploads.max_upload_bytes()?;

        let client = match config.server.client_dir.as_deref() {
            Some(dir) if Path::new(dir).is_dir() => {
                tracing::info!("Serving client from {}", dir);
                Some(ServeDir::new(dir).fallback(ServeFile::new(Path::new(dir).join("index.html"))))
            }
            Some(dir) => {
                tracing::warn!("Client directory {} does not exist; not serving a client", dir);
                None
            }
            None => None,
        };

        #[cfg(feature = "remote-upload")]
        let http = crate::services::remote::build_client(Duration::from_secs(
            config.uploads.fetch_timeout_secs,
        ))?;

        Ok(Self {
            config,
            db,
            store,
            broadcaster,
            max_upload_bytes,
            write_lock: Mutex::new(()),
            client,
            #[cfg(feature = "remote-upload")]
            http,
        })
    }
}
