//! Transaction providers.
//!
//! A provider answers one question: "give me this user's normalized
//! transactions for a date range". Providers are only used by sync; check-ins
//! read from the local transaction store.

mod file;
mod http;

pub use file::FileProvider;
pub use http::HttpProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{ConfigError, ProviderError};
use crate::model::Transaction;
use crate::storage::{Config, ProviderKind};

#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// Short identifier used in logs (e.g. "file", "http").
    fn name(&self) -> &str;

    /// Transactions posted between `start` and `end`, both inclusive.
    async fn fetch_transactions(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, ProviderError>;
}

/// Build the provider selected in the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn TransactionProvider>, ConfigError> {
    match config.provider.kind {
        ProviderKind::File => Ok(Arc::new(FileProvider::new(config.transactions_dir()?))),
        ProviderKind::Http => {
            let base_url = config
                .provider
                .base_url
                .as_deref()
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "provider.base_url".into(),
                    message: "required when provider.kind = \"http\"".into(),
                })?;
            let provider = HttpProvider::new(
                base_url,
                config.provider.api_key.clone(),
                Duration::from_secs(config.engine.provider_timeout_secs),
            )
            .map_err(|e| ConfigError::InvalidValue {
                key: "provider.base_url".into(),
                message: e.to_string(),
            })?;
            Ok(Arc::new(provider))
        }
    }
}

fn in_range(tx: &Transaction, start: NaiveDate, end: NaiveDate) -> bool {
    start <= tx.date && tx.date <= end
}
