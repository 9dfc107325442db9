use crate::services::import;
use crate::{Config, Database};
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(config_path: &Path, file: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;

    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Could not read {}", file.display()))?;
    let library = import::parse_legacy(&json)?;
    let report = import::import_legacy(&db, library)?;

    tracing::info!(
        "Import complete: {} imported, {} skipped",
        report.imported,
        report.skipped
    );

    Ok(())
}
