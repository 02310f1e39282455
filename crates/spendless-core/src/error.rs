//! Core error types for spendless-core.
//!
//! Every failure a caller can observe is a [`ChallengeError`]. A broken rule
//! is *not* an error: it is reported through
//! [`CheckInOutcome`](crate::engine::CheckInOutcome) and drives the
//! enrollment into the `failed` state.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::EnrollmentStatus;

/// Top-level error type for spendless-core.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// Missing or malformed caller input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The request conflicts with the current enrollment state
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// The requested date has not settled yet
    #[error("Too early to check in for {requested}: transactions are only final through {latest_settled}")]
    TooEarly {
        requested: NaiveDate,
        latest_settled: NaiveDate,
    },

    /// Rule parameters do not fit the declared rule type
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    /// Transaction provider failure
    #[error("Upstream error: {0}")]
    Upstream(#[from] ProviderError),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Template catalog failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Coarse classification used by the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl ChallengeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChallengeError::Validation(_) | ChallengeError::TooEarly { .. } => ErrorKind::Validation,
            ChallengeError::InvalidRule(_) => ErrorKind::Validation,
            ChallengeError::NotFound(_) => ErrorKind::NotFound,
            ChallengeError::Conflict(_) => ErrorKind::Conflict,
            ChallengeError::Upstream(_) => ErrorKind::Upstream,
            ChallengeError::Storage(StoreError::VersionConflict { .. }) => ErrorKind::Conflict,
            ChallengeError::Storage(StoreError::Duplicate(_)) => ErrorKind::Conflict,
            ChallengeError::Storage(_) | ChallengeError::Catalog(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status code for this error.
    ///
    /// Enrollment lookups answer 404 only on read paths; write paths report a
    /// missing enrollment as a bad request (see [`NotFoundError::status_code`]).
    pub fn status_code(&self) -> u16 {
        match self {
            ChallengeError::NotFound(e) => e.status_code(),
            ChallengeError::Upstream(ProviderError::NoLinkedAccount { .. }) => 400,
            ChallengeError::Upstream(ProviderError::Timeout { .. }) => 504,
            ChallengeError::Upstream(_) => 502,
            _ => match self.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::Upstream => 502,
                ErrorKind::Internal => 500,
            },
        }
    }
}

/// Input validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Required field missing or blank
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Check-in date before the enrollment started
    #[error("Check-in date {requested} is before the join date {join_date}")]
    BeforeJoinDate {
        requested: NaiveDate,
        join_date: NaiveDate,
    },

    /// No transaction provider configured for sync
    #[error("No transaction provider configured")]
    NoProvider,
}

/// Missing records.
#[derive(Error, Debug)]
pub enum NotFoundError {
    #[error("Challenge template '{0}' not found")]
    Template(String),

    #[error("User '{user_id}' is not enrolled in '{template_id}'")]
    Enrollment {
        user_id: String,
        template_id: String,
        /// Whether the lookup happened on a read-only path
        read_only: bool,
    },
}

impl NotFoundError {
    pub fn status_code(&self) -> u16 {
        match self {
            NotFoundError::Enrollment { read_only: false, .. } => 400,
            _ => 404,
        }
    }
}

/// State conflicts.
#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("User '{user_id}' already has an active enrollment in '{template_id}'")]
    AlreadyEnrolled { user_id: String, template_id: String },

    #[error("Challenge '{template_id}' has already failed; rejoin to start a new attempt")]
    AlreadyFailed { template_id: String },

    #[error("Challenge '{template_id}' is already completed")]
    AlreadyCompleted { template_id: String },

    #[error("Already checked in through {evaluated_through}")]
    AlreadyEvaluated { evaluated_through: NaiveDate },

    #[error("Invalid enrollment transition from {from} to {to}")]
    InvalidTransition {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
}

/// Rule parameter errors. Raised before any transaction is inspected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Unknown rule type '{0}'")]
    UnknownRuleType(String),

    #[error("Invalid parameters for {rule_type}: {message}")]
    InvalidParameters { rule_type: String, message: String },
}

/// Transaction provider errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("User '{user_id}' has no linked account")]
    NoLinkedAccount { user_id: String },

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider did not answer within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Malformed provider payload: {0}")]
    Malformed(String),

    #[error("Invalid provider URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Enrollment {enrollment_id} was modified concurrently (expected version {expected})")]
    VersionConflict { enrollment_id: String, expected: u64 },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Enrollment {0} not found")]
    MissingRecord(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store did not answer within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Catalog load errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read templates file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse templates TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Template '{id}' is invalid: {message}")]
    InvalidTemplate { id: String, message: String },

    #[error("Duplicate template id '{0}'")]
    DuplicateId(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Result type alias for ChallengeError
pub type Result<T, E = ChallengeError> = std::result::Result<T, E>;
