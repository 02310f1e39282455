pub mod catalog;
pub mod challenge;
pub mod config;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;
use spendless_core::engine::EngineSettings;
use spendless_core::{provider, ApiResponse, ChallengeApi, ChallengeEngine, Config, SqliteStore, StaticCatalog};
use tracing::debug;

/// `Ok(false)` means the command ran but answered with a failed envelope.
pub type CommandResult = Result<bool, Box<dyn std::error::Error>>;

/// Wire the engine from configuration: SQLite store, catalog and provider.
pub fn open_api(config: &Config) -> Result<ChallengeApi, Box<dyn std::error::Error>> {
    let catalog = match &config.catalog.templates_path {
        Some(path) => StaticCatalog::load(path)?,
        None => StaticCatalog::seeded(),
    };
    let db_path = config.database_path()?;
    debug!(db = %db_path.display(), provider = ?config.provider.kind, "opening engine");
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let engine = ChallengeEngine::new(Arc::new(catalog), store.clone(), store)
        .with_provider(provider::from_config(config)?)
        .with_settings(EngineSettings::from(&config.engine));
    Ok(ChallengeApi::new(Arc::new(engine)))
}

pub fn print_response<T: Serialize>(response: &ApiResponse<T>) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(response.success)
}
