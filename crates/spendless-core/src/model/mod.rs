//! Data model shared by the evaluator, the engine and the stores.

pub mod enrollment;
pub mod rule;
pub mod template;
pub mod transaction;

pub use enrollment::{Enrollment, EnrollmentStatus};
pub use rule::{Rule, RuleType};
pub use template::{ChallengeTemplate, Difficulty, MAX_DURATION_DAYS};
pub use transaction::{Category, Transaction};
