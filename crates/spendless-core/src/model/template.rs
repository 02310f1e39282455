//! Challenge templates: read-only definitions of a savings goal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rule::{Rule, RuleType};
use crate::error::CatalogError;

/// Longest challenge a template may describe, about ten years.
pub const MAX_DURATION_DAYS: u32 = 3650;

/// How hard a challenge is advertised to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Length of the challenge in whole calendar days, counting the join day
    pub duration_days: u32,
    pub rule: Rule,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Reward metadata, passed through untouched
    #[serde(default)]
    pub reward: BTreeMap<String, serde_json::Value>,
}

impl ChallengeTemplate {
    pub fn rule_type(&self) -> RuleType {
        self.rule.rule_type()
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |message: String| CatalogError::InvalidTemplate {
            id: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be blank".into()));
        }
        if self.title.trim().is_empty() {
            return Err(invalid("title must not be blank".into()));
        }
        if self.duration_days == 0 {
            return Err(invalid("duration_days must be at least 1".into()));
        }
        if self.duration_days > MAX_DURATION_DAYS {
            return Err(invalid(format!("duration_days must be at most {MAX_DURATION_DAYS}")));
        }
        self.rule.validate().map_err(|e| invalid(e.to_string()))
    }
}
