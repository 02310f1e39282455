//! Challenge engine.
//!
//! Orchestrates enrollment, check-in evaluation, streak bookkeeping and the
//! enrollment state machine. All collaborators are injected as ports:
//!
//! - [`Catalog`]: read-only challenge templates
//! - [`EnrollmentStore`]: enrollment records, written only by the engine
//! - [`TransactionStore`]: transactions, written only by [`ChallengeEngine::sync`]
//! - [`TransactionProvider`]: upstream source for sync
//! - [`Clock`]: the evaluation instant
//!
//! Every operation that writes an enrollment holds the per-(user, template)
//! lock for its whole read-evaluate-write cycle, and the store additionally
//! rejects stale versions. The write is the last step, so an operation that
//! fails or times out part-way leaves the record untouched.

mod check_in;
pub mod clock;
mod locks;

pub use check_in::CheckInOutcome;
pub use clock::{Clock, FixedClock, SystemClock};
pub use locks::KeyedLocks;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{ConflictError, NotFoundError, ProviderError, Result, StoreError, ValidationError};
use crate::model::{ChallengeTemplate, Enrollment, EnrollmentStatus};
use crate::provider::TransactionProvider;
use crate::storage::{EngineConfig, EnrollmentStore, TransactionStore};

/// Upper bound on a single sync request.
pub const MAX_SYNC_DAYS: u32 = 730;

/// Upper bound on the settlement lag.
pub const MAX_SETTLEMENT_LAG_DAYS: u32 = 30;

/// Engine policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Days that must pass before a day's transactions are trusted as final
    pub settlement_lag_days: u32,
    /// Bound on every wait for storage or the provider
    pub io_timeout: Duration,
    pub sync_default_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            settlement_lag_days: config.settlement_lag_days.min(MAX_SETTLEMENT_LAG_DAYS),
            io_timeout: Duration::from_secs(config.provider_timeout_secs.max(1)),
            sync_default_days: config.sync_default_days.clamp(1, MAX_SYNC_DAYS),
        }
    }
}

/// Read-only projection of an enrollment's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakView {
    pub enrollment_id: String,
    pub template_id: String,
    pub status: EnrollmentStatus,
    pub streak: u32,
    pub last_check_in: Option<DateTime<Utc>>,
    pub evaluated_through: Option<NaiveDate>,
    /// None when the template has since been removed from the catalog
    pub days_remaining: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Result of a transaction refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub user_id: String,
    pub provider: String,
    pub transaction_count: usize,
    pub date_range: DateRange,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

pub struct ChallengeEngine {
    catalog: Arc<dyn Catalog>,
    enrollments: Arc<dyn EnrollmentStore>,
    transactions: Arc<dyn TransactionStore>,
    provider: Option<Arc<dyn TransactionProvider>>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    locks: KeyedLocks,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field.to_string()).into());
    }
    Ok(())
}

impl ChallengeEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        enrollments: Arc<dyn EnrollmentStore>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            catalog,
            enrollments,
            transactions,
            provider: None,
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn TransactionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Await a store call, bounded by the configured I/O timeout.
    async fn store_io<T>(&self, fut: impl Future<Output = std::result::Result<T, StoreError>>) -> Result<T> {
        match tokio::time::timeout(self.settings.io_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout {
                timeout_secs: self.settings.io_timeout.as_secs(),
            }
            .into()),
        }
    }

    async fn load_template(&self, template_id: &str) -> Result<ChallengeTemplate> {
        self.catalog
            .template(template_id)
            .await?
            .ok_or_else(|| NotFoundError::Template(template_id.to_string()).into())
    }

    async fn load_enrollment(&self, user_id: &str, template_id: &str, read_only: bool) -> Result<Enrollment> {
        self.store_io(self.enrollments.current_enrollment(user_id, template_id))
            .await?
            .ok_or_else(|| {
                NotFoundError::Enrollment {
                    user_id: user_id.to_string(),
                    template_id: template_id.to_string(),
                    read_only,
                }
                .into()
            })
    }

    /// All templates a user can join.
    pub async fn templates(&self) -> Result<Vec<ChallengeTemplate>> {
        Ok(self.catalog.templates().await?)
    }

    /// Start a new attempt at `template_id`.
    ///
    /// Rejected while the user already holds an active enrollment for the
    /// template. A failed or completed attempt is kept as history and a fresh
    /// record is created with streak 0.
    pub async fn join(&self, user_id: &str, template_id: &str) -> Result<Enrollment> {
        require("user_id", user_id)?;
        require("template_id", template_id)?;
        let _guard = self.locks.acquire(user_id, template_id).await;

        let template = self.load_template(template_id).await?;
        let already_active = || ConflictError::AlreadyEnrolled {
            user_id: user_id.to_string(),
            template_id: template_id.to_string(),
        };

        let previous = self
            .store_io(self.enrollments.current_enrollment(user_id, template_id))
            .await?;
        if previous.as_ref().is_some_and(Enrollment::is_active) {
            return Err(already_active().into());
        }

        let enrollment = Enrollment::new(user_id, &template.id, self.clock.now());
        let stored = match self.store_io(self.enrollments.insert_enrollment(&enrollment)).await {
            Err(crate::error::ChallengeError::Storage(StoreError::Duplicate(_))) => {
                return Err(already_active().into())
            }
            other => other?,
        };

        info!(
            user_id,
            template_id,
            enrollment_id = %stored.id,
            rejoin = previous.is_some(),
            duration_days = template.duration_days,
            "joined challenge"
        );
        Ok(stored)
    }

    /// Start over after a failed attempt. Same as [`join`](Self::join).
    pub async fn rejoin(&self, user_id: &str, template_id: &str) -> Result<Enrollment> {
        self.join(user_id, template_id).await
    }

    /// Current enrollment record (read-only).
    pub async fn enrollment(&self, user_id: &str, template_id: &str) -> Result<Enrollment> {
        require("user_id", user_id)?;
        require("template_id", template_id)?;
        self.load_enrollment(user_id, template_id, true).await
    }

    pub async fn get_streak(&self, user_id: &str, template_id: &str) -> Result<StreakView> {
        let enrollment = self.enrollment(user_id, template_id).await?;
        let days_remaining = self
            .catalog
            .template(template_id)
            .await?
            .map(|t| t.duration_days.saturating_sub(enrollment.streak));

        Ok(StreakView {
            enrollment_id: enrollment.id,
            template_id: enrollment.template_id,
            status: enrollment.status,
            streak: enrollment.streak,
            last_check_in: enrollment.last_checked_at,
            evaluated_through: enrollment.last_evaluated_date,
            days_remaining: if enrollment.status == EnrollmentStatus::Active {
                days_remaining
            } else {
                Some(0)
            },
        })
    }

    /// Every attempt at `template_id`, newest first.
    pub async fn history(&self, user_id: &str, template_id: &str) -> Result<Vec<Enrollment>> {
        require("user_id", user_id)?;
        require("template_id", template_id)?;
        self.store_io(self.enrollments.enrollment_history(user_id, template_id))
            .await
    }

    /// The current enrollment for every template the user has joined.
    pub async fn enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>> {
        require("user_id", user_id)?;
        self.store_io(self.enrollments.user_enrollments(user_id)).await
    }

    /// Refresh the user's transactions for the trailing `days` days,
    /// today included.
    pub async fn sync(&self, user_id: &str, days: Option<u32>) -> Result<SyncReport> {
        require("user_id", user_id)?;
        let days = days.unwrap_or(self.settings.sync_default_days);
        if days == 0 || days > MAX_SYNC_DAYS {
            return Err(ValidationError::InvalidValue {
                field: "days".into(),
                message: format!("must be between 1 and {MAX_SYNC_DAYS}"),
            }
            .into());
        }
        let provider = self.provider.as_ref().ok_or(ValidationError::NoProvider)?;

        let end = self.clock.today();
        let start = end - chrono::Duration::days(i64::from(days) - 1);

        let fetched = tokio::time::timeout(
            self.settings.io_timeout,
            provider.fetch_transactions(user_id, start, end),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            timeout_secs: self.settings.io_timeout.as_secs(),
        })
        .and_then(|r| r);

        let fetched = match fetched {
            Ok(txs) => txs,
            Err(e) => {
                warn!(user_id, provider = provider.name(), error = %e, "transaction fetch failed");
                return Err(e.into());
            }
        };

        let summary = self
            .store_io(self.transactions.upsert_transactions(user_id, &fetched))
            .await?;

        info!(
            user_id,
            provider = provider.name(),
            fetched = fetched.len(),
            inserted = summary.inserted,
            updated = summary.updated,
            "synced transactions"
        );

        Ok(SyncReport {
            user_id: user_id.to_string(),
            provider: provider.name().to_string(),
            transaction_count: fetched.len(),
            date_range: DateRange { start, end },
            inserted: summary.inserted,
            updated: summary.updated,
            unchanged: summary.unchanged,
        })
    }
}
