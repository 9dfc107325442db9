use anyhow::Result;
use std::path::PathBuf;

pub async fn run(path: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(path.join("data"))?;
    std::fs::create_dir_all(path.join("data/uploads"))?;

    let config_path = path.join("mediahub.toml");
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    let config = r#"[server]
host = "127.0.0.1"
port = 3001
# client_dir = "./client/dist"

[database]
path = "./data/mediahub.db"

[storage]
upload_dir = "./data/uploads"
public_base_url = ""

[uploads]
max_upload_size = "50MB"
fetch_timeout_secs = 30

[realtime]
channel_capacity = 256
keep_alive_secs = 30

[cors]
allowed_origins = []
"#;

    std::fs::write(&config_path, config)?;

    tracing::info!("Created new media hub at {:?}", path);
    tracing::info!("Run 'mediahub migrate' to set up the database");
    tracing::info!("Run 'mediahub serve' to start the server");

    Ok(())
}
