//! Normalized bank transaction records.
//!
//! Transactions are produced by the external provider and are read-only to
//! the rest of the crate. Amounts keep the provider's sign convention:
//! positive values are money leaving the account, negative values are
//! incoming credits.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Two-level spending classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub detailed: Option<String>,
}

impl Category {
    pub fn new(primary: impl Into<String>, detailed: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            detailed: Some(detailed.into()),
        }
    }

    /// Substring match against the detailed or primary category.
    ///
    /// `FOOD_AND_DRINK_FAST_FOOD` matches a detailed category of
    /// `FOOD_AND_DRINK_FAST_FOOD_BURGERS`. Matching is case-sensitive, and any
    /// category sharing the needle as a substring matches, related or not.
    pub fn contains(&self, needle: &str) -> bool {
        let hit = |value: &Option<String>| value.as_deref().is_some_and(|v| v.contains(needle));
        hit(&self.detailed) || hit(&self.primary)
    }
}

/// A normalized transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Provider-assigned id, stable across re-ingestion
    pub id: String,
    /// Signed amount: positive = outflow, negative = credit
    pub amount: Decimal,
    /// Posting date
    pub date: NaiveDate,
    /// Date the purchase was authorized, when known
    #[serde(default)]
    pub authorized_date: Option<NaiveDate>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category: Category,
}

impl Transaction {
    pub fn new(id: impl Into<String>, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            amount,
            date,
            authorized_date: None,
            merchant_name: None,
            category: Category::default(),
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant_name = Some(merchant.into());
        self
    }

    pub fn with_category(mut self, primary: impl Into<String>, detailed: impl Into<String>) -> Self {
        self.category = Category::new(primary, detailed);
        self
    }

    pub fn with_authorized_date(mut self, date: NaiveDate) -> Self {
        self.authorized_date = Some(date);
        self
    }

    /// The calendar day this transaction belongs to: the authorized date
    /// when present, otherwise the posting date.
    pub fn effective_date(&self) -> NaiveDate {
        self.authorized_date.unwrap_or(self.date)
    }

    pub fn matches_category(&self, needle: &str) -> bool {
        self.category.contains(needle)
    }

    /// Exact membership of the merchant name in `merchants`.
    pub fn matches_merchant(&self, merchants: &[String]) -> bool {
        self.merchant_name
            .as_ref()
            .is_some_and(|name| merchants.iter().any(|m| m == name))
    }

    /// Short human-readable description used in failure reasons.
    pub fn describe(&self) -> String {
        format!(
            "{} for ${} on {}",
            self.merchant_name.as_deref().unwrap_or("unknown merchant"),
            self.amount,
            self.effective_date()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn authorized_date_wins_over_posting_date() {
        let tx = Transaction::new("t1", Decimal::new(450, 2), day(3)).with_authorized_date(day(2));
        assert_eq!(tx.effective_date(), day(2));

        let tx = Transaction::new("t2", Decimal::new(450, 2), day(3));
        assert_eq!(tx.effective_date(), day(3));
    }

    #[test]
    fn category_match_is_substring_on_either_level() {
        let tx = Transaction::new("t1", Decimal::ONE, day(1))
            .with_category("FOOD_AND_DRINK", "FOOD_AND_DRINK_FAST_FOOD_BURGERS");
        assert!(tx.matches_category("FOOD_AND_DRINK_FAST_FOOD"));
        assert!(tx.matches_category("FOOD_AND_DRINK"));
        assert!(!tx.matches_category("food_and_drink"));
        assert!(!tx.matches_category("TRANSPORTATION"));
    }

    #[test]
    fn missing_category_never_matches() {
        let tx = Transaction::new("t1", Decimal::ONE, day(1));
        assert!(!tx.matches_category("FOOD"));
    }

    #[test]
    fn merchant_match_is_exact() {
        let merchants = vec!["McDonald's".to_string()];
        let tx = Transaction::new("t1", Decimal::ONE, day(1)).with_merchant("McDonald's");
        assert!(tx.matches_merchant(&merchants));

        let tx = Transaction::new("t2", Decimal::ONE, day(1)).with_merchant("McDonald's #42");
        assert!(!tx.matches_merchant(&merchants));
    }

    #[test]
    fn deserializes_with_optional_fields_absent() {
        let json = r#"{"id":"abc","amount":"12.50","date":"2026-03-04"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, Decimal::new(1250, 2));
        assert_eq!(tx.category, Category::default());
        assert!(tx.merchant_name.is_none());
    }
}
