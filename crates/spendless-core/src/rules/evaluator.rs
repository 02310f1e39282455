//! Per-variant grading logic.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::window::EvaluationWindow;
use crate::error::RuleError;
use crate::model::{Rule, RuleType, Transaction};

/// Which days a `streak_goal` rule must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakMode {
    /// The last `duration` days of the window
    #[default]
    Trailing,
    /// Every day of the window
    WholePeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub window: EvaluationWindow,
    pub streak_mode: StreakMode,
}

impl EvaluationContext {
    pub fn new(window: EvaluationWindow) -> Self {
        Self {
            window,
            streak_mode: StreakMode::default(),
        }
    }

    pub fn with_streak_mode(mut self, mode: StreakMode) -> Self {
        self.streak_mode = mode;
        self
    }
}

/// Verdict plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub rule_type: RuleType,
    pub broken: bool,
    pub reason: String,
    /// Offending transactions, ordered by date then id
    pub violating_transactions: Vec<Transaction>,
    /// Days with no qualifying transaction (`streak_goal` only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_days: Vec<NaiveDate>,
    /// Absolute spend counted against the cap (`spend_cap` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_total: Option<Decimal>,
    pub transactions_considered: usize,
}

impl Evaluation {
    fn new(rule_type: RuleType, considered: usize) -> Self {
        Self {
            rule_type,
            broken: false,
            reason: String::new(),
            violating_transactions: Vec::new(),
            missing_days: Vec::new(),
            matched_total: None,
            transactions_considered: considered,
        }
    }

    pub fn first_violation(&self) -> Option<&Transaction> {
        self.violating_transactions.first()
    }
}

/// Grade `transactions` against `rule`.
///
/// `transactions` must already be restricted to the evaluation window; the
/// window in `ctx` is only consulted to enumerate days for `streak_goal`.
/// Pure and deterministic: the result does not depend on input order.
pub fn evaluate(rule: &Rule, transactions: &[Transaction], ctx: &EvaluationContext) -> Result<Evaluation, RuleError> {
    rule.validate()?;
    let mut eval = Evaluation::new(rule.rule_type(), transactions.len());

    match rule {
        Rule::SpendBlock { category_filter, merchants } => {
            if category_filter.is_none() && merchants.is_empty() {
                eval.reason = "No spending targets configured".into();
                return Ok(eval);
            }
            let hits = matching(transactions, |tx| {
                category_filter.as_deref().is_some_and(|c| tx.matches_category(c)) || tx.matches_merchant(merchants)
            });
            eval.broken = !hits.is_empty();
            eval.reason = match hits.first() {
                Some(first) => with_more(format!("Blocked purchase at {}", first.describe()), hits.len()),
                None => "No blocked purchases found".into(),
            };
            eval.violating_transactions = hits;
        }

        Rule::SpendCap { category_filter, cap_amount } => {
            let hits = matching(transactions, |tx| tx.matches_category(category_filter));
            // Absolute values: credits and refunds count as spend, they never offset it.
            let total: Decimal = hits.iter().map(|tx| tx.amount.abs()).sum();
            eval.broken = total > *cap_amount;
            eval.matched_total = Some(total);
            eval.reason = match hits.first() {
                Some(first) if eval.broken => with_more(
                    format!(
                        "Spent ${total} on {category_filter}, over the ${cap_amount} cap, starting with {}",
                        first.describe()
                    ),
                    hits.len(),
                ),
                _ => format!("Spent ${total} of the ${cap_amount} cap on {category_filter}"),
            };
            if eval.broken {
                eval.violating_transactions = hits;
            }
        }

        Rule::Replacement { from_category, to_category } => {
            let from_hits = matching(transactions, |tx| tx.matches_category(from_category));
            let replaced = transactions.iter().any(|tx| tx.matches_category(to_category));
            eval.broken = !from_hits.is_empty() && !replaced;
            eval.reason = match (from_hits.first(), replaced) {
                (Some(first), false) => with_more(
                    format!("Bought {from_category} at {} with no {to_category} replacement", first.describe()),
                    from_hits.len(),
                ),
                (Some(_), true) => format!("{from_category} spending offset by {to_category} purchases"),
                (None, true) => format!("Replaced {from_category} with {to_category}"),
                (None, false) => format!("No {from_category} spending"),
            };
            if eval.broken {
                eval.violating_transactions = from_hits;
            }
        }

        Rule::StreakGoal { category_filter, duration } => {
            let covered: BTreeSet<NaiveDate> = transactions
                .iter()
                .filter(|tx| tx.matches_category(category_filter))
                .map(Transaction::effective_date)
                .collect();
            let days = match ctx.streak_mode {
                StreakMode::Trailing => ctx.window.trailing(*duration),
                StreakMode::WholePeriod => ctx.window,
            };
            eval.missing_days = days.days().filter(|d| !covered.contains(d)).collect();
            eval.broken = !eval.missing_days.is_empty();
            eval.reason = match eval.missing_days.first() {
                Some(first) => with_more(format!("No {category_filter} purchase on {first}"), eval.missing_days.len()),
                None => format!("{category_filter} purchase on all {} days", days.len_days()),
            };
        }
    }

    Ok(eval)
}

fn matching(transactions: &[Transaction], pred: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
    let mut hits: Vec<Transaction> = transactions.iter().filter(|tx| pred(tx)).cloned().collect();
    hits.sort_by(|a, b| a.effective_date().cmp(&b.effective_date()).then_with(|| a.id.cmp(&b.id)));
    hits
}

fn with_more(message: String, count: usize) -> String {
    if count > 1 {
        format!("{message} (and {} more)", count - 1)
    } else {
        message
    }
}
