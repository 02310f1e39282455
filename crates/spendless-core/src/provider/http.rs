//! Provider backed by a remote aggregation service.
//!
//! `POST {base_url}/transactions/get` with `{user_id, start_date, end_date}`.
//! The service answers in the aggregator's wire shape, which is normalized
//! into [`Transaction`] here. HTTP 404 means the user has no linked account.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{in_range, TransactionProvider};
use crate::error::ProviderError;
use crate::model::{Category, Transaction};

pub struct HttpProvider {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    transactions: Vec<WireTransaction>,
}

#[derive(Deserialize)]
struct WireTransaction {
    transaction_id: String,
    amount: Decimal,
    date: NaiveDate,
    #[serde(default)]
    authorized_date: Option<NaiveDate>,
    #[serde(default)]
    merchant_name: Option<String>,
    /// Raw statement descriptor, used when no clean merchant name exists
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    personal_finance_category: Option<WireCategory>,
}

#[derive(Deserialize)]
struct WireCategory {
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    detailed: Option<String>,
}

impl From<WireTransaction> for Transaction {
    fn from(wire: WireTransaction) -> Self {
        let category = wire
            .personal_finance_category
            .map(|c| Category {
                primary: c.primary,
                detailed: c.detailed,
            })
            .unwrap_or_default();
        Transaction {
            id: wire.transaction_id,
            amount: wire.amount,
            date: wire.date,
            authorized_date: wire.authorized_date,
            merchant_name: wire.merchant_name.or(wire.name),
            category,
        }
    }
}

impl HttpProvider {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("transactions/get")?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            timeout,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ProviderError::Http(err)
        }
    }
}

#[async_trait]
impl TransactionProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_transactions(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, ProviderError> {
        let body = json!({
            "user_id": user_id,
            "start_date": start.to_string(),
            "end_date": end.to_string(),
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NoLinkedAccount {
                user_id: user_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await.map_err(|e| self.map_send_error(e))?;
        let payload: TransactionsResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(payload
            .transactions
            .into_iter()
            .map(Transaction::from)
            .filter(|tx| in_range(tx, start, end))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn provider(url: &str) -> HttpProvider {
        HttpProvider::new(url, Some("secret".into()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_normalizes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/transactions/get")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::PartialJson(json!({
                "user_id": "u1",
                "start_date": "2026-03-01",
                "end_date": "2026-03-07",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"transactions": [
                    {"transaction_id": "tx1", "amount": 8.99, "date": "2026-03-02",
                     "authorized_date": "2026-03-01", "merchant_name": "Burger Barn",
                     "personal_finance_category": {"primary": "FOOD_AND_DRINK",
                                                   "detailed": "FOOD_AND_DRINK_FAST_FOOD"}},
                    {"transaction_id": "tx2", "amount": -12.00, "date": "2026-03-03",
                     "name": "REFUND ACME"}
                ]}"#,
            )
            .create_async()
            .await;

        let txs = provider(&format!("{}/api", server.url()))
            .fetch_transactions("u1", day(1), day(7))
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].effective_date(), day(1));
        assert_eq!(txs[0].amount, "8.99".parse::<Decimal>().unwrap());
        assert!(txs[0].matches_category("FAST_FOOD"));
        assert_eq!(txs[1].merchant_name.as_deref(), Some("REFUND ACME"));
        assert!(txs[1].amount.is_sign_negative());
    }

    #[tokio::test]
    async fn not_found_means_no_linked_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transactions/get")
            .with_status(404)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_transactions("u1", day(1), day(7))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoLinkedAccount { .. }));
    }

    #[tokio::test]
    async fn server_error_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transactions/get")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_transactions("u1", day(1), day(7))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn malformed_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transactions/get")
            .with_status(200)
            .with_body(r#"{"accounts": []}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_transactions("u1", day(1), day(7))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
