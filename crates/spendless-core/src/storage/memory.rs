//! In-memory store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EnrollmentStore, TransactionStore, UpsertSummary};
use crate::error::StoreError;
use crate::model::{Enrollment, Transaction};

type PairKey = (String, String);

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Attempts per (user, template), oldest first
    enrollments: Mutex<HashMap<PairKey, Vec<Enrollment>>>,
    transactions: Mutex<HashMap<String, BTreeMap<String, Transaction>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(user_id: &str, template_id: &str) -> PairKey {
    (user_id.to_string(), template_id.to_string())
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn current_enrollment(&self, user_id: &str, template_id: &str) -> Result<Option<Enrollment>, StoreError> {
        let map = self.enrollments.lock()?;
        Ok(map
            .get(&key(user_id, template_id))
            .and_then(|attempts| attempts.last().cloned()))
    }

    async fn enrollment_history(&self, user_id: &str, template_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let map = self.enrollments.lock()?;
        Ok(map
            .get(&key(user_id, template_id))
            .map(|attempts| attempts.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let map = self.enrollments.lock()?;
        let mut current: Vec<Enrollment> = map
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .filter_map(|(_, attempts)| attempts.last().cloned())
            .collect();
        current.sort_by(|a, b| a.template_id.cmp(&b.template_id));
        Ok(current)
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, StoreError> {
        let mut map = self.enrollments.lock()?;
        let attempts = map.entry(key(&enrollment.user_id, &enrollment.template_id)).or_default();
        if attempts.iter().any(Enrollment::is_active) {
            return Err(StoreError::Duplicate(format!(
                "active enrollment for {}/{}",
                enrollment.user_id, enrollment.template_id
            )));
        }
        let mut stored = enrollment.clone();
        stored.version = 1;
        attempts.push(stored.clone());
        Ok(stored)
    }

    async fn update_enrollment(&self, enrollment: &Enrollment, expected_version: u64) -> Result<Enrollment, StoreError> {
        let mut map = self.enrollments.lock()?;
        let slot = map
            .get_mut(&key(&enrollment.user_id, &enrollment.template_id))
            .and_then(|attempts| attempts.iter_mut().find(|e| e.id == enrollment.id))
            .ok_or_else(|| StoreError::MissingRecord(enrollment.id.clone()))?;

        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                enrollment_id: enrollment.id.clone(),
                expected: expected_version,
            });
        }
        let mut stored = enrollment.clone();
        stored.version = expected_version + 1;
        *slot = stored.clone();
        Ok(stored)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn upsert_transactions(&self, user_id: &str, transactions: &[Transaction]) -> Result<UpsertSummary, StoreError> {
        let mut map = self.transactions.lock()?;
        let user = map.entry(user_id.to_string()).or_default();
        let mut summary = UpsertSummary::default();
        for tx in transactions {
            match user.insert(tx.id.clone(), tx.clone()) {
                None => summary.inserted += 1,
                Some(previous) if previous == *tx => summary.unchanged += 1,
                Some(_) => summary.updated += 1,
            }
        }
        Ok(summary)
    }

    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let map = self.transactions.lock()?;
        Ok(map
            .get(user_id)
            .map(|txs| txs.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnrollmentStatus;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn single_active_enrollment_per_pair() {
        let store = MemoryStore::new();
        let first = Enrollment::new("u1", "t1", Utc::now());
        store.insert_enrollment(&first).await.unwrap();

        let second = Enrollment::new("u1", "t1", Utc::now());
        let err = store.insert_enrollment(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // A different template is independent.
        store.insert_enrollment(&Enrollment::new("u1", "t2", Utc::now())).await.unwrap();
    }

    #[tokio::test]
    async fn failed_attempt_kept_as_history() {
        let store = MemoryStore::new();
        let stored = store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();

        let mut failed = stored.clone();
        failed
            .fail("broke it", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), Utc::now())
            .unwrap();
        store.update_enrollment(&failed, stored.version).await.unwrap();

        let rejoined = store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();
        let current = store.current_enrollment("u1", "t1").await.unwrap().unwrap();
        assert_eq!(current.id, rejoined.id);

        let history = store.enrollment_history("u1", "t1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, EnrollmentStatus::Active);
        assert_eq!(history[1].status, EnrollmentStatus::Failed);
    }

    #[tokio::test]
    async fn stale_version_rejected() {
        let store = MemoryStore::new();
        let stored = store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();

        let mut a = stored.clone();
        a.streak = 1;
        store.update_enrollment(&a, stored.version).await.unwrap();

        let mut b = stored.clone();
        b.streak = 1;
        let err = store.update_enrollment(&b, stored.version).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let tx = Transaction::new("t1", Decimal::new(500, 2), day);

        let first = store.upsert_transactions("u1", &[tx.clone()]).await.unwrap();
        assert_eq!(first.inserted, 1);
        let again = store.upsert_transactions("u1", &[tx.clone()]).await.unwrap();
        assert_eq!(again.unchanged, 1);

        let corrected = Transaction::new("t1", Decimal::new(550, 2), day);
        let fixed = store.upsert_transactions("u1", &[corrected]).await.unwrap();
        assert_eq!(fixed.updated, 1);

        assert_eq!(store.transactions_for("u1").await.unwrap().len(), 1);
        assert!(store.transactions_for("u2").await.unwrap().is_empty());
    }
}
