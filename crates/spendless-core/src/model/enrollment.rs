//! Enrollment records and their state machine.
//!
//! ```text
//!            check-in (ok, days remain)
//!              +------+
//!              v      |
//!   join --> ACTIVE --+--> COMPLETED   (ok, final day confirmed)
//!              |
//!              +--------> FAILED       (rule broken)
//!
//!   FAILED / COMPLETED --join--> new ACTIVE record (history kept)
//! ```
//!
//! `failed` and `completed` are terminal for a given record. Rejoining never
//! mutates the old record; it creates a new one.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConflictError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Failed,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Failed => "failed",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EnrollmentStatus::Active),
            "failed" => Some(EnrollmentStatus::Failed),
            "completed" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }

    pub fn can_transition_to(&self, to: &EnrollmentStatus) -> bool {
        match self {
            EnrollmentStatus::Active => matches!(
                to,
                EnrollmentStatus::Active | EnrollmentStatus::Failed | EnrollmentStatus::Completed
            ),
            EnrollmentStatus::Failed | EnrollmentStatus::Completed => false,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's attempt at one challenge template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub status: EnrollmentStatus,
    pub joined_at: DateTime<Utc>,
    /// Consecutive confirmed days without a violation
    pub streak: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Last calendar day covered by a check-in
    pub last_evaluated_date: Option<NaiveDate>,
    /// Set only when `status` is `failed`
    pub failure_reason: Option<String>,
    /// Set only when `status` is `completed`
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful write
    pub version: u64,
}

impl Enrollment {
    pub fn new(user_id: impl Into<String>, template_id: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            template_id: template_id.into(),
            status: EnrollmentStatus::Active,
            joined_at,
            streak: 0,
            last_checked_at: None,
            last_evaluated_date: None,
            failure_reason: None,
            completed_at: None,
            version: 0,
        }
    }

    /// First day of the evaluation window.
    pub fn join_date(&self) -> NaiveDate {
        self.joined_at.date_naive()
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    fn transition(&mut self, to: EnrollmentStatus) -> Result<(), ConflictError> {
        if !self.status.can_transition_to(&to) {
            return Err(ConflictError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    /// Record a clean check-in through `through`.
    pub fn advance(&mut self, streak: u32, through: NaiveDate, at: DateTime<Utc>) -> Result<(), ConflictError> {
        self.transition(EnrollmentStatus::Active)?;
        self.streak = streak;
        self.last_evaluated_date = Some(through);
        self.last_checked_at = Some(at);
        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), ConflictError> {
        self.transition(EnrollmentStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Streak is left as it was: the last confirmed run before the violation.
    pub fn fail(&mut self, reason: impl Into<String>, through: NaiveDate, at: DateTime<Utc>) -> Result<(), ConflictError> {
        self.transition(EnrollmentStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        self.last_evaluated_date = Some(through);
        self.last_checked_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn joined() -> Enrollment {
        Enrollment::new("u1", "no-fast-food-7d", Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap())
    }

    #[test]
    fn new_enrollment_is_active_with_zero_streak() {
        let e = joined();
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.streak, 0);
        assert_eq!(e.join_date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(e.failure_reason.is_none());
        assert!(e.completed_at.is_none());
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let now = Utc::now();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut failed = joined();
        failed.fail("bought a burger", day, now).unwrap();
        assert_eq!(failed.status, EnrollmentStatus::Failed);
        assert!(failed.advance(2, day, now).is_err());
        assert!(failed.complete(now).is_err());

        let mut done = joined();
        done.advance(7, day, now).unwrap();
        done.complete(now).unwrap();
        assert!(done.fail("late", day, now).is_err());
        assert!(done.completed_at.is_some());
        assert!(done.failure_reason.is_none());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [EnrollmentStatus::Active, EnrollmentStatus::Failed, EnrollmentStatus::Completed] {
            assert_eq!(EnrollmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EnrollmentStatus::parse("paused"), None);
    }
}
