//! Provider backed by exported JSON files, one per user.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{in_range, TransactionProvider};
use crate::error::ProviderError;
use crate::model::Transaction;

/// Reads `<dir>/<user_id>.json`, a JSON array of transactions.
/// A user without a file has no linked account.
pub struct FileProvider {
    dir: PathBuf,
}

impl FileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, ProviderError> {
        let safe = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
            && !user_id.starts_with('.');
        if !safe {
            return Err(ProviderError::NoLinkedAccount {
                user_id: user_id.to_string(),
            });
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

#[async_trait]
impl TransactionProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_transactions(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, ProviderError> {
        let path = self.path_for(user_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NoLinkedAccount {
                    user_id: user_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let transactions: Vec<Transaction> =
            serde_json::from_str(&content).map_err(|e| ProviderError::Malformed(format!("{}: {e}", path.display())))?;
        Ok(transactions
            .into_iter()
            .filter(|tx| in_range(tx, start, end))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn reads_and_filters_by_posting_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("u1.json"),
            r#"[
                {"id": "a", "amount": "4.50", "date": "2026-03-01"},
                {"id": "b", "amount": "9.99", "date": "2026-03-05",
                 "merchant_name": "Burger Barn",
                 "category": {"primary": "FOOD_AND_DRINK", "detailed": "FOOD_AND_DRINK_FAST_FOOD"}},
                {"id": "c", "amount": "-20.00", "date": "2026-03-09"}
            ]"#,
        )
        .unwrap();

        let provider = FileProvider::new(dir.path());
        let txs = provider.fetch_transactions("u1", day(2), day(9)).await.unwrap();
        let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(txs[0].matches_category("FAST_FOOD"));
    }

    #[tokio::test]
    async fn missing_file_means_no_linked_account() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path());
        let err = provider.fetch_transactions("ghost", day(1), day(2)).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoLinkedAccount { .. }));
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileProvider::new(dir.path());
        let err = provider.fetch_transactions("../etc/passwd", day(1), day(2)).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoLinkedAccount { .. }));
    }

    #[tokio::test]
    async fn malformed_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("u1.json"), "{not json").unwrap();
        let provider = FileProvider::new(dir.path());
        let err = provider.fetch_transactions("u1", day(1), day(2)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
