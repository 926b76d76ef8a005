//! AgriPay wallet API client
//!
//! Wraps the wallet endpoints used by the marketplace: balance, transaction
//! history, purchase, top-up and withdrawal. Requests are not retried.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::AgriPayConfig;
use crate::error::{AppError, AppResult};

/// Wallet operations the services rely on
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Debit the wallet for an order
    async fn purchase(&self, request: PurchaseRequest) -> AppResult<WalletReceipt>;

    async fn topup(&self, request: TopUpRequest) -> AppResult<WalletReceipt>;

    /// Withdraw funds; requires the wallet password like a purchase
    async fn withdraw(&self, request: PurchaseRequest) -> AppResult<WalletReceipt>;
}

/// AgriPay API client
#[derive(Clone)]
pub struct AgriPayClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Debit the wallet (purchase or withdrawal)
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Credit the wallet
#[derive(Debug, Clone, Serialize)]
pub struct TopUpRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Outcome of a wallet mutation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WalletReceipt {
    pub status: Option<String>,
    pub transaction_id: Option<String>,
    pub new_balance: Option<Decimal>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletBalance {
    pub balance: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", alias = "transaction_type")]
    pub transaction_type: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransactionHistory {
    pub transactions: Vec<WalletTransaction>,
    pub stats: serde_json::Value,
}

/// Filters for the transaction history endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TransactionQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub limit: u32,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            transaction_type: None,
            start_date: None,
            end_date: None,
            limit: 50,
        }
    }
}

/// Map a failed wallet mutation to an error. 400 means the wallet cannot
/// cover the amount and 403 that the token was refused.
pub fn classify_failure(status: StatusCode, body: &str) -> AppError {
    match status {
        StatusCode::BAD_REQUEST => AppError::PaymentDeclined("Insufficient funds".to_string()),
        StatusCode::FORBIDDEN => AppError::PaymentDeclined("Authentication failed".to_string()),
        _ => AppError::ExternalService(format!("AgriPay error: {} - {}", status, body)),
    }
}

impl AgriPayClient {
    /// Build a client from configuration. A user token takes precedence
    /// over the platform token.
    pub fn new(config: &AgriPayConfig, user_token: Option<String>) -> AppResult<Self> {
        let token = user_token
            .or_else(|| config.api_token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Configuration("AgriPay token not provided".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/wallet/{}/", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> AppResult<T> {
        response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse {} response: {}", what, e))
        })
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        request
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("AgriPay request failed: {}", e)))
    }

    /// Read-only request; any failure status is an upstream error
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> AppResult<T> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "AgriPay error: {} - {}",
                status, body
            )));
        }

        Self::parse(response, what).await
    }

    async fn post_mutation<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<WalletReceipt> {
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, path, "AgriPay request rejected");
            return Err(classify_failure(status, &body));
        }

        Self::parse(response, path).await
    }

    /// Current wallet balance
    pub async fn get_balance(&self) -> AppResult<WalletBalance> {
        self.fetch(self.client.get(self.url("balance")), "balance").await
    }

    /// Transaction history with optional filters
    pub async fn get_transactions(
        &self,
        query: &TransactionQuery,
    ) -> AppResult<TransactionHistory> {
        let request = self.client.get(self.url("transactions")).query(query);
        self.fetch(request, "transactions").await
    }
}

#[async_trait]
impl PaymentGateway for AgriPayClient {
    async fn purchase(&self, request: PurchaseRequest) -> AppResult<WalletReceipt> {
        self.post_mutation("purchase", &request).await
    }

    async fn topup(&self, request: TopUpRequest) -> AppResult<WalletReceipt> {
        self.post_mutation("topup", &request).await
    }

    async fn withdraw(&self, request: PurchaseRequest) -> AppResult<WalletReceipt> {
        self.post_mutation("withdraw", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> AgriPayConfig {
        AgriPayConfig {
            api_url: "http://agripay.test/api/".to_string(),
            api_token: token.map(str::to_string),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, ""),
            AppError::PaymentDeclined(msg) if msg == "Insufficient funds"
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, ""),
            AppError::PaymentDeclined(msg) if msg == "Authentication failed"
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "upstream"),
            AppError::ExternalService(_)
        ));
    }

    #[test]
    fn test_user_token_takes_precedence() {
        let client =
            AgriPayClient::new(&config(Some("platform")), Some("user".to_string())).unwrap();
        assert_eq!(client.auth_header(), "Token user");
        assert_eq!(client.url("balance"), "http://agripay.test/api/wallet/balance/");
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        assert!(matches!(
            AgriPayClient::new(&config(None), None),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_purchase_amount_serialized_as_string() {
        let request = PurchaseRequest {
            amount: Decimal::new(12550, 2),
            password: "secret".to_string(),
            description: None,
            reference: Some("order-1".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "125.50");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_topup_omits_empty_reference() {
        let request = TopUpRequest {
            amount: Decimal::from(50),
            description: Some("AgriTrace wallet top-up".to_string()),
            reference: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "50");
        assert!(json.get("reference").is_none());
    }

    #[tokio::test]
    async fn test_wallet_reads_report_unreachable_service() {
        let mut unreachable = config(Some("platform"));
        unreachable.api_url = "http://127.0.0.1:1/api".to_string();
        unreachable.timeout_secs = 2;
        let client = AgriPayClient::new(&unreachable, None).unwrap();

        assert!(matches!(
            client.get_balance().await,
            Err(AppError::ExternalService(msg)) if msg.starts_with("AgriPay request failed")
        ));
        assert!(matches!(
            client.get_transactions(&TransactionQuery::default()).await,
            Err(AppError::ExternalService(msg)) if msg.starts_with("AgriPay request failed")
        ));
    }
}
