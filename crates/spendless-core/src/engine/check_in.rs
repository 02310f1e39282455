//! Check-in: evaluate the settled part of an enrollment and advance it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{require, ChallengeEngine};
use crate::error::{ChallengeError, ConflictError, ProviderError, Result, ValidationError};
use crate::model::{Enrollment, EnrollmentStatus, Transaction};
use crate::rules::{evaluate, Evaluation, EvaluationContext, EvaluationWindow, StreakMode};

/// What a check-in decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    pub status: EnrollmentStatus,
    pub streak: u32,
    pub rule_broken: bool,
    pub days_remaining: u32,
    /// Days that were graded
    pub window: EvaluationWindow,
    pub evaluation: Evaluation,
    /// The record as stored after this check-in
    pub enrollment: Enrollment,
}

impl ChallengeEngine {
    /// Evaluate the challenge rule from the join date through `confirm_date`
    /// and update the enrollment.
    ///
    /// `confirm_date` defaults to the most recent settled day (today minus the
    /// settlement lag). The window never extends past the template duration.
    /// A broken rule moves the enrollment to `failed` and keeps its streak; a
    /// clean window sets the streak to the number of days covered and
    /// completes the challenge once that reaches the duration.
    pub async fn check_in(
        &self,
        user_id: &str,
        template_id: &str,
        confirm_date: Option<NaiveDate>,
    ) -> Result<CheckInOutcome> {
        require("user_id", user_id)?;
        require("template_id", template_id)?;
        let _guard = self.locks.acquire(user_id, template_id).await;

        let template = self.load_template(template_id).await?;
        let enrollment = self.load_enrollment(user_id, template_id, false).await?;
        match enrollment.status {
            EnrollmentStatus::Active => {}
            EnrollmentStatus::Failed => {
                return Err(ConflictError::AlreadyFailed {
                    template_id: template_id.to_string(),
                }
                .into())
            }
            EnrollmentStatus::Completed => {
                return Err(ConflictError::AlreadyCompleted {
                    template_id: template_id.to_string(),
                }
                .into())
            }
        }

        let now = self.clock.now();
        let latest_settled = now
            .date_naive()
            .checked_sub_signed(Duration::days(i64::from(self.settings.settlement_lag_days)))
            .ok_or_else(|| out_of_range("settlement_lag_days", self.settings.settlement_lag_days))?;
        let join_date = enrollment.join_date();

        let confirm = match confirm_date {
            Some(requested) if requested > latest_settled => {
                return Err(ChallengeError::TooEarly {
                    requested,
                    latest_settled,
                })
            }
            Some(requested) if requested < join_date => {
                return Err(ValidationError::BeforeJoinDate { requested, join_date }.into())
            }
            Some(requested) => requested,
            None if latest_settled < join_date => {
                return Err(ChallengeError::TooEarly {
                    requested: join_date,
                    latest_settled,
                })
            }
            None => latest_settled,
        };

        let duration = template.duration_days.max(1);
        let last_day = join_date
            .checked_add_signed(Duration::days(i64::from(duration) - 1))
            .ok_or_else(|| out_of_range("duration_days", duration))?;
        let window_end = confirm.min(last_day);
        if let Some(through) = enrollment.last_evaluated_date {
            if window_end <= through {
                return Err(ConflictError::AlreadyEvaluated {
                    evaluated_through: through,
                }
                .into());
            }
        }
        let window = EvaluationWindow::new(join_date, window_end)?;

        let transactions: Vec<Transaction> = match tokio::time::timeout(
            self.settings.io_timeout,
            self.transactions.transactions_for(user_id),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(user_id, template_id, "timed out reading transactions, enrollment untouched");
                return Err(ProviderError::Timeout {
                    timeout_secs: self.settings.io_timeout.as_secs(),
                }
                .into());
            }
        };
        let in_window: Vec<Transaction> = transactions
            .into_iter()
            .filter(|tx| window.contains(tx.effective_date()))
            .collect();
        debug!(user_id, template_id, start = %window.start, end = %window.end, count = in_window.len(), "evaluating");

        let ctx = EvaluationContext::new(window).with_streak_mode(StreakMode::WholePeriod);
        let evaluation = evaluate(&template.rule, &in_window, &ctx)?;

        let mut updated = enrollment.clone();
        if evaluation.broken {
            updated.fail(evaluation.reason.clone(), window_end, now)?;
        } else {
            let streak = window.len_days().min(duration);
            updated.advance(streak, window_end, now)?;
            if streak >= duration {
                updated.complete(now)?;
            }
        }

        let stored = match self
            .store_io(self.enrollments.update_enrollment(&updated, enrollment.version))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(user_id, template_id, enrollment_id = %enrollment.id, error = %e, "enrollment write rejected");
                return Err(e);
            }
        };

        if evaluation.broken {
            warn!(
                user_id,
                template_id,
                enrollment_id = %stored.id,
                rule_type = %evaluation.rule_type,
                reason = %evaluation.reason,
                "challenge failed"
            );
        } else {
            info!(
                user_id,
                template_id,
                enrollment_id = %stored.id,
                streak = stored.streak,
                status = %stored.status,
                "check-in recorded"
            );
        }

        Ok(CheckInOutcome {
            status: stored.status,
            streak: stored.streak,
            rule_broken: evaluation.broken,
            days_remaining: match stored.status {
                EnrollmentStatus::Active => duration.saturating_sub(stored.streak),
                _ => 0,
            },
            window,
            evaluation,
            enrollment: stored,
        })
    }
}

fn out_of_range(field: &str, days: u32) -> ChallengeError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("{days} days runs past the supported calendar"),
    }
    .into()
}
