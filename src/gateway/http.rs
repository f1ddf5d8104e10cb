//! HTTP Transfer Gateway
//!
//! JSON-over-HTTPS adapter for a Paystack-style transfer API:
//!
//! | Operation               | Endpoint                                             |
//! |-------------------------|------------------------------------------------------|
//! | create recipient        | `POST /transferrecipient`                            |
//! | initiate transfer       | `POST /transfer`                                     |
//! | dedicated account total | `GET /transaction?status=success&account_number=..`  |
//!
//! The transaction listing is filtered by the provider to the dedicated
//! account, so a store's total costs one request per hundred deposits rather
//! than a walk over the whole integration's history.
//!
//! Every response is wrapped in `{ "status": bool, "message": str, "data": .. }`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GatewayError, TransferGateway};
use crate::config::GatewayConfig;
use crate::money::{MINOR_UNIT_DECIMALS, from_minor_units};

/// Transactions fetched per page when summing dedicated account deposits
const PAGE_SIZE: u32 = 100;

/// Upper bound on pages walked for a single account total. Anything larger
/// fails with `Truncated` instead of returning a partial sum.
const MAX_PAGES: u32 = 20;

/// Response envelope shared by every endpoint
#[derive(Deserialize, Debug)]
struct ApiEnvelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    #[allow(dead_code)]
    page: u32,
    page_count: u32,
}

#[derive(Serialize)]
struct RecipientRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    account_number: &'a str,
    bank_code: &'a str,
    currency: &'a str,
}

#[derive(Deserialize, Debug)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Serialize)]
struct TransferBody<'a> {
    source: &'static str,
    amount: i64,
    recipient: &'a str,
    reason: &'a str,
    reference: &'a str,
}

#[derive(Deserialize, Debug)]
struct TransferData {
    transfer_code: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TransactionData {
    /// Minor units
    amount: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    authorization: Option<Authorization>,
}

#[derive(Deserialize, Debug)]
struct Authorization {
    #[serde(default)]
    receiver_bank_account_number: Option<String>,
}

/// Transfer gateway backed by the provider's REST API
pub struct HttpTransferGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    currency: String,
}

impl HttpTransferGateway {
    /// Create a gateway client with the configured per-request timeout
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        info!(
            "Initializing transfer gateway at {} (timeout {}ms)",
            config.base_url, config.timeout_ms
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiEnvelope<T>, GatewayError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport)?;
        decode_envelope(status, &body)
    }
}

fn map_transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Decode a provider response, mapping non-2xx and `status: false` to errors
fn decode_envelope<T: DeserializeOwned>(
    http_status: u16,
    body: &str,
) -> Result<ApiEnvelope<T>, GatewayError> {
    if !(200..300).contains(&http_status) {
        // Error bodies usually still carry a message
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
            .map(|env| env.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        return Err(GatewayError::Http {
            status: http_status,
            message,
        });
    }

    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    if !envelope.status {
        return Err(GatewayError::Rejected(envelope.message));
    }
    Ok(envelope)
}

fn require_data<T>(envelope: ApiEnvelope<T>) -> Result<T, GatewayError> {
    envelope
        .data
        .ok_or_else(|| GatewayError::Malformed("missing data field".to_string()))
}

/// Sum settled deposits credited to `account_number` on one page
fn sum_account_deposits(transactions: &[TransactionData], account_number: &str) -> i64 {
    transactions
        .iter()
        .filter(|tx| tx.status == "success")
        .filter(|tx| {
            tx.authorization
                .as_ref()
                .and_then(|a| a.receiver_bank_account_number.as_deref())
                == Some(account_number)
        })
        .map(|tx| tx.amount)
        .sum()
}

/// Page to fetch after `page`, or `None` when the listing is exhausted
fn next_page(
    page: u32,
    page_count: Option<u32>,
    page_was_empty: bool,
) -> Result<Option<u32>, GatewayError> {
    let page_count = page_count.unwrap_or(page);
    if page_was_empty || page >= page_count {
        return Ok(None);
    }
    if page >= MAX_PAGES {
        return Err(GatewayError::Truncated(format!(
            "{} pages of deposits, limit is {}",
            page_count, MAX_PAGES
        )));
    }
    Ok(Some(page + 1))
}

#[async_trait]
impl TransferGateway for HttpTransferGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn create_recipient(
        &self,
        account_number: &str,
        bank_code: &str,
        account_name: &str,
    ) -> Result<String, GatewayError> {
        let body = RecipientRequest {
            kind: "nuban",
            name: account_name,
            account_number,
            bank_code,
            currency: &self.currency,
        };

        let envelope: ApiEnvelope<RecipientData> = self
            .send(self.client.post(self.url("/transferrecipient")).json(&body))
            .await?;
        let data = require_data(envelope)?;

        debug!(account_number, recipient = %data.recipient_code, "Transfer recipient ready");
        Ok(data.recipient_code)
    }

    async fn initiate_transfer(
        &self,
        amount_minor: i64,
        recipient_code: &str,
        reason: &str,
        reference: &str,
    ) -> Result<String, GatewayError> {
        let body = TransferBody {
            source: "balance",
            amount: amount_minor,
            recipient: recipient_code,
            reason,
            reference,
        };

        let envelope: ApiEnvelope<TransferData> = self
            .send(self.client.post(self.url("/transfer")).json(&body))
            .await?;
        let data = require_data(envelope)?;

        if data.status.as_deref() == Some("failed") {
            return Err(GatewayError::Rejected(format!(
                "transfer {} failed at provider",
                data.transfer_code
            )));
        }

        info!(
            reference,
            transfer_code = %data.transfer_code,
            amount_minor,
            "Transfer initiated"
        );
        Ok(data.transfer_code)
    }

    async fn dedicated_account_transaction_total(
        &self,
        account_number: &str,
    ) -> Result<Decimal, GatewayError> {
        let mut total_minor: i64 = 0;
        let mut page = 1;

        loop {
            let request = self.client.get(self.url("/transaction")).query(&[
                ("status", "success".to_string()),
                ("account_number", account_number.to_string()),
                ("perPage", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
            let envelope: ApiEnvelope<Vec<TransactionData>> = self.send(request).await?;
            let meta = envelope.meta;
            let transactions = require_data(envelope)?;

            total_minor = total_minor
                .checked_add(sum_account_deposits(&transactions, account_number))
                .ok_or_else(|| GatewayError::Malformed("deposit total overflow".to_string()))?;

            match next_page(page, meta.map(|m| m.page_count), transactions.is_empty())? {
                Some(next) => page = next,
                None => break,
            }
        }

        debug!(account_number, total_minor, pages = page, "Dedicated account total");
        Ok(from_minor_units(total_minor, MINOR_UNIT_DECIMALS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_recipient() {
        let body = r#"{"status":true,"message":"Transfer recipient created",
            "data":{"recipient_code":"RCP_1a2b3c","type":"nuban"}}"#;
        let env: ApiEnvelope<RecipientData> = decode_envelope(200, body).unwrap();
        assert_eq!(require_data(env).unwrap().recipient_code, "RCP_1a2b3c");
    }

    #[test]
    fn test_decode_status_false() {
        let body = r#"{"status":false,"message":"Cannot resolve account"}"#;
        let err = decode_envelope::<RecipientData>(200, body).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("Cannot resolve account".into()));
    }

    #[test]
    fn test_decode_non_2xx() {
        let body = r#"{"status":false,"message":"Invalid key"}"#;
        let err = decode_envelope::<TransferData>(401, body).unwrap_err();
        assert_eq!(
            err,
            GatewayError::Http {
                status: 401,
                message: "Invalid key".into()
            }
        );

        let err = decode_envelope::<TransferData>(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Http { status: 502, .. }));
    }

    #[test]
    fn test_decode_malformed() {
        let err = decode_envelope::<TransferData>(200, "not json").unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));

        let env: ApiEnvelope<TransferData> =
            decode_envelope(200, r#"{"status":true,"message":"ok"}"#).unwrap();
        assert!(matches!(require_data(env), Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn test_sum_account_deposits() {
        let body = r#"{"status":true,"message":"ok","meta":{"page":1,"pageCount":1},"data":[
            {"amount":500000,"status":"success","authorization":{"receiver_bank_account_number":"9900000001"}},
            {"amount":100000,"status":"success","authorization":{"receiver_bank_account_number":"9900000002"}},
            {"amount":250000,"status":"failed","authorization":{"receiver_bank_account_number":"9900000001"}},
            {"amount":70000,"status":"success","authorization":null},
            {"amount":25050,"status":"success","authorization":{"receiver_bank_account_number":"9900000001"}}
        ]}"#;
        let env: ApiEnvelope<Vec<TransactionData>> = decode_envelope(200, body).unwrap();
        assert_eq!(env.meta.map(|m| m.page_count), Some(1));
        let txs = require_data(env).unwrap();

        let minor = sum_account_deposits(&txs, "9900000001");
        assert_eq!(minor, 525_050);
        assert_eq!(
            from_minor_units(minor, MINOR_UNIT_DECIMALS),
            Decimal::new(525_050, 2)
        );
    }

    #[test]
    fn test_next_page() {
        assert_eq!(next_page(1, Some(3), false), Ok(Some(2)));
        assert_eq!(next_page(3, Some(3), false), Ok(None));
        // No meta: treat the current page as the last one
        assert_eq!(next_page(1, None, false), Ok(None));
        assert_eq!(next_page(2, Some(5), true), Ok(None));
    }

    #[test]
    fn test_next_page_refuses_partial_total() {
        assert_eq!(next_page(MAX_PAGES - 1, Some(MAX_PAGES), false), Ok(Some(MAX_PAGES)));
        assert_eq!(next_page(MAX_PAGES, Some(MAX_PAGES), false), Ok(None));

        let err = next_page(MAX_PAGES, Some(MAX_PAGES + 100), false).unwrap_err();
        assert!(matches!(err, GatewayError::Truncated(_)));
        assert!(err.to_string().contains(&(MAX_PAGES + 100).to_string()));
    }

    #[test]
    fn test_transfer_body_shape() {
        let body = TransferBody {
            source: "balance",
            amount: 15_000,
            recipient: "RCP_x",
            reason: "Store withdrawal",
            reference: "01J0000000000000000000000",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 15_000);
        assert_eq!(json["source"], "balance");
        assert_eq!(json["reference"], "01J0000000000000000000000");

        let recipient = RecipientRequest {
            kind: "nuban",
            name: "Ada",
            account_number: "0123456789",
            bank_code: "044",
            currency: "NGN",
        };
        let json = serde_json::to_value(&recipient).unwrap();
        assert_eq!(json["type"], "nuban");
    }
}
