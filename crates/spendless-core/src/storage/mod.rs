//! Persistence ports and adapters.
//!
//! The engine talks to storage only through [`EnrollmentStore`] and
//! [`TransactionStore`]. Two adapters implement both:
//! - [`MemoryStore`] for tests and one-shot runs
//! - [`SqliteStore`] for the CLI, backed by a single SQLite file

mod config;
pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use config::{CatalogConfig, Config, EngineConfig, LoggingConfig, ProviderConfig, ProviderKind, StorageConfig};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};
use crate::model::{Enrollment, Transaction};

/// Enrollment records keyed by (user id, template id).
///
/// Every attempt is kept as its own record; the most recently joined one is
/// the *current* enrollment. Writes are compare-and-swap on
/// [`Enrollment::version`].
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn current_enrollment(&self, user_id: &str, template_id: &str) -> Result<Option<Enrollment>, StoreError>;

    /// All attempts, newest first.
    async fn enrollment_history(&self, user_id: &str, template_id: &str) -> Result<Vec<Enrollment>, StoreError>;

    /// The current enrollment for every template the user has joined.
    async fn user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError>;

    /// Insert a new attempt. Fails with [`StoreError::Duplicate`] if the user
    /// already holds an active enrollment for the template.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, StoreError>;

    /// Replace the stored record if its version still equals
    /// `expected_version`. Returns the stored record with its bumped version.
    async fn update_enrollment(&self, enrollment: &Enrollment, expected_version: u64) -> Result<Enrollment, StoreError>;
}

/// Transaction records keyed by (user id, transaction id).
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert or replace by transaction id. Re-ingesting identical records is
    /// a no-op.
    async fn upsert_transactions(&self, user_id: &str, transactions: &[Transaction]) -> Result<UpsertSummary, StoreError>;

    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError>;
}

/// Counts from one upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Returns `~/.config/spendless[-dev]/` based on SPENDLESS_ENV.
///
/// Set SPENDLESS_ENV=dev to use the development data directory, or
/// SPENDLESS_HOME to use an explicit directory.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os("SPENDLESS_HOME") {
        let dir = PathBuf::from(home);
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SPENDLESS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("spendless-dev")
    } else {
        base_dir.join("spendless")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
