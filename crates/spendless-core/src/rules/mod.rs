//! Rule evaluator.
//!
//! Grades a set of already-windowed transactions against a [`Rule`]. The
//! evaluator performs no I/O and never looks outside the transactions it is
//! handed; identical inputs always yield identical verdicts.
//!
//! [`Rule`]: crate::model::Rule

pub mod evaluator;
pub mod window;

pub use evaluator::{evaluate, Evaluation, EvaluationContext, StreakMode};
pub use window::EvaluationWindow;

use crate::error::RuleError;
use crate::model::{Rule, Transaction};

/// Evaluate a rule given as a rule-type name plus untyped parameters.
///
/// Parameters that do not fit the declared type are rejected before any
/// transaction is inspected.
pub fn evaluate_raw(
    rule_type: &str,
    params: serde_json::Value,
    transactions: &[Transaction],
    ctx: &EvaluationContext,
) -> Result<Evaluation, RuleError> {
    let rule = Rule::from_parts(rule_type, params)?;
    evaluate(&rule, transactions, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn window() -> EvaluationWindow {
        EvaluationWindow::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn raw_parameters_mismatch_fails_fast() {
        let err = evaluate_raw("spend_cap", json!({"category_filter": "COFFEE"}), &[], &EvaluationContext::new(window()))
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidParameters { .. }));
    }

    const CATEGORIES: &[&str] = &[
        "FOOD_AND_DRINK_FAST_FOOD",
        "FOOD_AND_DRINK_COFFEE",
        "FOOD_AND_DRINK_GROCERIES",
        "TRANSPORTATION_TAXIS_AND_RIDE_SHARES",
    ];

    fn arb_transaction() -> impl Strategy<Value = Transaction> {
        (0u32..10_000, -5_000i64..20_000, 0u32..7, 0usize..CATEGORIES.len(), any::<bool>()).prop_map(
            |(id, cents, offset, cat, merchant)| {
                let date = NaiveDate::from_ymd_opt(2026, 3, 1 + offset).unwrap();
                let mut tx = Transaction::new(format!("tx-{id}"), Decimal::new(cents, 2), date)
                    .with_category("GENERAL", CATEGORIES[cat]);
                if merchant {
                    tx = tx.with_merchant("Burger Barn");
                }
                tx
            },
        )
    }

    fn arb_rule() -> impl Strategy<Value = Rule> {
        prop_oneof![
            Just(Rule::SpendBlock {
                category_filter: Some("FAST_FOOD".into()),
                merchants: vec!["Burger Barn".into()],
            }),
            (0i64..50_000).prop_map(|cents| Rule::SpendCap {
                category_filter: "FOOD_AND_DRINK".into(),
                cap_amount: Decimal::new(cents, 2),
            }),
            Just(Rule::Replacement {
                from_category: "FAST_FOOD".into(),
                to_category: "GROCERIES".into(),
            }),
            (1u32..8).prop_map(|duration| Rule::StreakGoal {
                category_filter: "GROCERIES".into(),
                duration,
            }),
        ]
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(
            rule in arb_rule(),
            txs in prop::collection::vec(arb_transaction(), 0..24),
            whole in any::<bool>(),
        ) {
            let mode = if whole { StreakMode::WholePeriod } else { StreakMode::Trailing };
            let ctx = EvaluationContext::new(window()).with_streak_mode(mode);
            let first = evaluate(&rule, &txs, &ctx).unwrap();
            let second = evaluate(&rule, &txs, &ctx).unwrap();
            prop_assert_eq!(&first, &second);

            let mut reversed = txs.clone();
            reversed.reverse();
            let third = evaluate(&rule, &reversed, &ctx).unwrap();
            prop_assert_eq!(first.broken, third.broken);
            prop_assert_eq!(first.violating_transactions.len(), third.violating_transactions.len());
        }
    }
}
