//! # Spendless Core Library
//!
//! Core logic for spending-habit challenges. A user joins a challenge
//! template (for example "no fast food for 7 days"), transactions are synced
//! from an upstream provider, and each check-in grades the settled days since
//! joining against the template's rule, advancing or failing the streak.
//!
//! ## Architecture
//!
//! - **Rules**: a pure evaluator over already-windowed transactions
//! - **Engine**: enrollment state machine, check-in windowing and sync
//! - **Storage**: SQLite or in-memory stores plus TOML configuration
//! - **Providers**: where transactions come from (JSON files or HTTP)
//! - **Catalog**: read-only challenge templates
//!
//! ## Key Components
//!
//! - [`ChallengeEngine`]: join, check-in, streak and sync operations
//! - [`ChallengeApi`]: the same operations wrapped in [`ApiResponse`]
//! - [`evaluate`]: grade transactions against a [`Rule`]
//! - [`SqliteStore`]: enrollment and transaction persistence
//! - [`Config`]: application configuration management

pub mod api;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod rules;
pub mod storage;

pub use api::{ApiResponse, ChallengeApi};
pub use catalog::{Catalog, StaticCatalog};
pub use engine::{ChallengeEngine, CheckInOutcome, Clock, EngineSettings, FixedClock, StreakView, SyncReport, SystemClock};
pub use error::{ChallengeError, ConfigError, ErrorKind, ProviderError, RuleError, StoreError, ValidationError};
pub use model::{Category, ChallengeTemplate, Difficulty, Enrollment, EnrollmentStatus, Rule, RuleType, Transaction};
pub use provider::{FileProvider, HttpProvider, TransactionProvider};
pub use rules::{evaluate, Evaluation, EvaluationContext, EvaluationWindow, StreakMode};
pub use storage::{Config, EnrollmentStore, MemoryStore, SqliteStore, TransactionStore};
