//! Structured response envelope.
//!
//! [`ChallengeApi`] wraps the engine so that every operation, successful or
//! not, yields an [`ApiResponse`]. Callers never receive a bare error: a rule
//! violation is a failed response with `challengeFailed: true` and the
//! evaluation attached; any other error carries its status code and kind.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::{ChallengeEngine, CheckInOutcome, StreakView, SyncReport};
use crate::error::{ChallengeError, ErrorKind};
use crate::model::{ChallengeTemplate, Enrollment, EnrollmentStatus};
use crate::rules::Evaluation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    /// HTTP-style status code
    pub status: u16,
    pub message: String,
    pub challenge_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl<T> ApiResponse<T> {
    pub fn ok(status: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            status,
            message: message.into(),
            challenge_failed: false,
            error: None,
            data: Some(data),
            evaluation: None,
        }
    }

    pub fn from_error(err: &ChallengeError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            error!(error = %err, "internal error");
        }
        Self {
            success: false,
            status: err.status_code(),
            message: err.to_string(),
            challenge_failed: false,
            error: Some(kind),
            data: None,
            evaluation: None,
        }
    }

    fn from_result(result: Result<T, ChallengeError>, status: u16, message: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => {
                let message = message(&data);
                Self::ok(status, message, data)
            }
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Envelope-producing facade over [`ChallengeEngine`].
#[derive(Clone)]
pub struct ChallengeApi {
    engine: Arc<ChallengeEngine>,
}

impl ChallengeApi {
    pub fn new(engine: Arc<ChallengeEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ChallengeEngine {
        &self.engine
    }

    pub async fn templates(&self) -> ApiResponse<Vec<ChallengeTemplate>> {
        ApiResponse::from_result(self.engine.templates().await, 200, |t| {
            format!("{} challenges available", t.len())
        })
    }

    pub async fn join(&self, user_id: &str, template_id: &str) -> ApiResponse<Enrollment> {
        ApiResponse::from_result(self.engine.join(user_id, template_id).await, 201, |e| {
            format!("Joined '{}'", e.template_id)
        })
    }

    /// A broken rule answers 400 with `challengeFailed` set and the updated
    /// enrollment still attached as data.
    pub async fn check_in(
        &self,
        user_id: &str,
        template_id: &str,
        confirm_date: Option<NaiveDate>,
    ) -> ApiResponse<CheckInOutcome> {
        let outcome = match self.engine.check_in(user_id, template_id, confirm_date).await {
            Ok(outcome) => outcome,
            Err(e) => return ApiResponse::from_error(&e),
        };

        let evaluation = outcome.evaluation.clone();
        if outcome.rule_broken {
            return ApiResponse {
                success: false,
                status: 400,
                message: format!("Challenge failed: {}", evaluation.reason),
                challenge_failed: true,
                error: None,
                data: Some(outcome),
                evaluation: Some(evaluation),
            };
        }

        let message = match outcome.status {
            EnrollmentStatus::Completed => format!("Challenge completed with a {}-day streak", outcome.streak),
            _ => format!("Streak is now {} ({} days to go)", outcome.streak, outcome.days_remaining),
        };
        let mut response = ApiResponse::ok(200, message, outcome);
        response.evaluation = Some(evaluation);
        response
    }

    pub async fn streak(&self, user_id: &str, template_id: &str) -> ApiResponse<StreakView> {
        ApiResponse::from_result(self.engine.get_streak(user_id, template_id).await, 200, |v| {
            format!("{}-day streak ({})", v.streak, v.status)
        })
    }

    pub async fn enrollment(&self, user_id: &str, template_id: &str) -> ApiResponse<Enrollment> {
        ApiResponse::from_result(self.engine.enrollment(user_id, template_id).await, 200, |e| {
            format!("Enrollment is {}", e.status)
        })
    }

    pub async fn history(&self, user_id: &str, template_id: &str) -> ApiResponse<Vec<Enrollment>> {
        ApiResponse::from_result(self.engine.history(user_id, template_id).await, 200, |h| {
            format!("{} attempts", h.len())
        })
    }

    pub async fn enrollments(&self, user_id: &str) -> ApiResponse<Vec<Enrollment>> {
        ApiResponse::from_result(self.engine.enrollments(user_id).await, 200, |e| {
            format!("{} enrollments", e.len())
        })
    }

    pub async fn sync(&self, user_id: &str, days: Option<u32>) -> ApiResponse<SyncReport> {
        ApiResponse::from_result(self.engine.sync(user_id, days).await, 200, |r| {
            format!(
                "Synced {} transactions from {} to {}",
                r.transaction_count, r.date_range.start, r.date_range.end
            )
        })
    }
}
