//! Rule variants and their parameters.
//!
//! A rule is a tagged union keyed by its rule type; each variant carries its
//! own strongly-typed parameters. Rules are validated when a template is
//! loaded, and again by the evaluator before any transaction is inspected.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::template::MAX_DURATION_DAYS;
use crate::error::RuleError;

/// Rule type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    SpendBlock,
    SpendCap,
    Replacement,
    StreakGoal,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::SpendBlock => "spend_block",
            RuleType::SpendCap => "spend_cap",
            RuleType::Replacement => "replacement",
            RuleType::StreakGoal => "streak_goal",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spend_block" => Ok(RuleType::SpendBlock),
            "spend_cap" => Ok(RuleType::SpendCap),
            "replacement" => Ok(RuleType::Replacement),
            "streak_goal" => Ok(RuleType::StreakGoal),
            other => Err(RuleError::UnknownRuleType(other.to_string())),
        }
    }
}

/// A grading rule with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Rule {
    /// Broken by any transaction matching the category or the merchant list.
    /// With neither configured the rule can never be broken.
    SpendBlock {
        #[serde(default)]
        category_filter: Option<String>,
        #[serde(default)]
        merchants: Vec<String>,
    },
    /// Broken when the absolute spend in the category exceeds the cap.
    SpendCap {
        category_filter: String,
        cap_amount: Decimal,
    },
    /// Broken when the window has `from_category` spend and no
    /// `to_category` transaction to offset it.
    Replacement {
        from_category: String,
        to_category: String,
    },
    /// Broken when any day in the window lacks a matching transaction.
    StreakGoal {
        category_filter: String,
        duration: u32,
    },
}

impl Rule {
    pub fn rule_type(&self) -> RuleType {
        match self {
            Rule::SpendBlock { .. } => RuleType::SpendBlock,
            Rule::SpendCap { .. } => RuleType::SpendCap,
            Rule::Replacement { .. } => RuleType::Replacement,
            Rule::StreakGoal { .. } => RuleType::StreakGoal,
        }
    }

    /// Build a rule from a rule-type name and an untyped parameter object.
    ///
    /// Fails fast when the type is unknown or the parameters do not have the
    /// shape that type requires.
    pub fn from_parts(rule_type: &str, params: serde_json::Value) -> Result<Self, RuleError> {
        let kind: RuleType = rule_type.parse()?;
        let invalid = |message: String| RuleError::InvalidParameters {
            rule_type: kind.to_string(),
            message,
        };

        let mut object = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => return Err(invalid(format!("expected an object, got {other}"))),
        };
        if object.contains_key("type") {
            return Err(invalid("parameters must not carry a 'type' field".into()));
        }
        object.insert("type".into(), serde_json::Value::String(kind.to_string()));

        let rule: Rule =
            serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| invalid(e.to_string()))?;
        rule.validate()?;
        Ok(rule)
    }

    /// Check semantic constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), RuleError> {
        let invalid = |message: &str| RuleError::InvalidParameters {
            rule_type: self.rule_type().to_string(),
            message: message.to_string(),
        };

        match self {
            Rule::SpendBlock { category_filter, merchants } => {
                if category_filter.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err(invalid("category_filter must not be blank"));
                }
                if merchants.iter().any(|m| m.trim().is_empty()) {
                    return Err(invalid("merchant names must not be blank"));
                }
            }
            Rule::SpendCap { category_filter, cap_amount } => {
                if category_filter.trim().is_empty() {
                    return Err(invalid("category_filter is required"));
                }
                if cap_amount.is_sign_negative() {
                    return Err(invalid("cap_amount must not be negative"));
                }
            }
            Rule::Replacement { from_category, to_category } => {
                if from_category.trim().is_empty() {
                    return Err(invalid("from_category is required"));
                }
                if to_category.trim().is_empty() {
                    return Err(invalid("to_category is required"));
                }
            }
            Rule::StreakGoal { category_filter, duration } => {
                if category_filter.trim().is_empty() {
                    return Err(invalid("category_filter is required"));
                }
                if *duration == 0 {
                    return Err(invalid("duration must be at least 1 day"));
                }
                if *duration > MAX_DURATION_DAYS {
                    return Err(invalid("duration is longer than any challenge may run"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_parts_builds_each_variant() {
        let rule = Rule::from_parts("spend_block", json!({"category_filter": "FAST_FOOD"})).unwrap();
        assert_eq!(rule.rule_type(), RuleType::SpendBlock);

        let rule = Rule::from_parts(
            "spend_cap",
            json!({"category_filter": "COFFEE", "cap_amount": "25.00"}),
        )
        .unwrap();
        assert_eq!(
            rule,
            Rule::SpendCap {
                category_filter: "COFFEE".into(),
                cap_amount: Decimal::new(2500, 2),
            }
        );

        let rule = Rule::from_parts("streak_goal", json!({"category_filter": "GROCERIES", "duration": 3})).unwrap();
        assert_eq!(rule.rule_type(), RuleType::StreakGoal);
    }

    #[test]
    fn spend_block_without_targets_is_valid() {
        let rule = Rule::from_parts("spend_block", json!({})).unwrap();
        assert_eq!(
            rule,
            Rule::SpendBlock {
                category_filter: None,
                merchants: vec![],
            }
        );
    }

    #[test]
    fn replacement_missing_leg_is_invalid() {
        let err = Rule::from_parts("replacement", json!({"from_category": "RESTAURANTS"})).unwrap_err();
        assert!(matches!(err, RuleError::InvalidParameters { ref rule_type, .. } if rule_type == "replacement"));

        let err = Rule::from_parts(
            "replacement",
            json!({"from_category": "RESTAURANTS", "to_category": "  "}),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::InvalidParameters { .. }));
    }

    #[test]
    fn mismatched_shape_fails_fast() {
        // spend_cap parameters declared as streak_goal
        let err = Rule::from_parts(
            "streak_goal",
            json!({"category_filter": "COFFEE", "cap_amount": "25.00"}),
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::InvalidParameters { .. }));

        let err = Rule::from_parts("spend_cap", json!(["COFFEE"])).unwrap_err();
        assert!(matches!(err, RuleError::InvalidParameters { .. }));
    }

    #[test]
    fn unknown_rule_type() {
        let err = Rule::from_parts("spend_forever", json!({})).unwrap_err();
        assert_eq!(err, RuleError::UnknownRuleType("spend_forever".into()));
    }

    #[test]
    fn negative_cap_and_zero_duration_rejected() {
        let rule = Rule::SpendCap {
            category_filter: "COFFEE".into(),
            cap_amount: Decimal::new(-1, 0),
        };
        assert!(rule.validate().is_err());

        let rule = Rule::StreakGoal {
            category_filter: "GROCERIES".into(),
            duration: 0,
        };
        assert!(rule.validate().is_err());

        let rule = Rule::StreakGoal {
            category_filter: "GROCERIES".into(),
            duration: MAX_DURATION_DAYS + 1,
        };
        assert!(rule.validate().is_err());
    }

    #[test]
    fn toml_tagged_form() {
        let rule: Rule = toml::from_str(
            r#"
            type = "replacement"
            from_category = "FOOD_AND_DRINK_RESTAURANT"
            to_category = "FOOD_AND_DRINK_GROCERIES"
        "#,
        )
        .unwrap();
        assert_eq!(rule.rule_type(), RuleType::Replacement);
    }
}
