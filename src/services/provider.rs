//! Upstream provider adapter: translates domain requests into
//! provider-specific payloads, performs the HTTP call with a per-call
//! deadline and normalizes the response.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::payment::{Card, Payment, PaymentRequest, PaymentStatus, RefundRequest};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn process_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError>;

    async fn refund_payment(
        &self,
        payment_id: &str,
        request: &RefundRequest,
    ) -> Result<Payment, GatewayError>;

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError>;

    /// Stable id used for refund routing.
    fn id(&self) -> &str;

    /// Human-readable name used in logs and error messages.
    fn name(&self) -> &str;
}

pub type RequestTranslator = fn(&PaymentRequest) -> serde_json::Value;
pub type ResponseTranslator = fn(&[u8]) -> Result<Payment, serde_json::Error>;

pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    /// POST, expects 200 on success.
    pub charge_endpoint: String,
    /// POST, `{id}` substituted with the payment id.
    pub refund_endpoint: String,
    /// GET, `{id}` substituted with the payment id.
    pub get_charge_endpoint: String,
    pub request_translator: RequestTranslator,
    pub response_translator: ResponseTranslator,
}

pub struct HttpProvider {
    id: String,
    config: ProviderConfig,
    client: Client,
}

impl HttpProvider {
    pub fn new(id: impl Into<String>, config: ProviderConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            id: id.into(),
            config,
            client,
        }
    }

    async fn decode_response(&self, response: reqwest::Response) -> Result<Payment, GatewayError> {
        let status = response.status();
        if status != StatusCode::OK {
            return Err(GatewayError::UpstreamStatus {
                provider: self.config.name.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|source| GatewayError::Transport {
            provider: self.config.name.clone(),
            source,
        })?;
        (self.config.response_translator)(&body).map_err(|source| GatewayError::Decode {
            provider: self.config.name.clone(),
            source,
        })
    }

    fn transport_error(&self, source: reqwest::Error) -> GatewayError {
        GatewayError::Transport {
            provider: self.config.name.clone(),
            source,
        }
    }
}

#[async_trait]
impl PaymentProvider for HttpProvider {
    async fn process_payment(&self, request: &PaymentRequest) -> Result<Payment, GatewayError> {
        let payload = (self.config.request_translator)(request);
        let url = format!("{}{}", self.config.base_url, self.config.charge_endpoint);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;
        self.decode_response(response).await
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        request: &RefundRequest,
    ) -> Result<Payment, GatewayError> {
        let endpoint = self.config.refund_endpoint.replace("{id}", payment_id);
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;
        self.decode_response(response).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        let endpoint = self.config.get_charge_endpoint.replace("{id}", payment_id);
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;
        self.decode_response(response).await
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Charge payload in the wire format the standard upstreams accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePayload {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub card: Card,
}

/// Payment in the wire format the standard upstreams answer with. The
/// `status` field is free text and goes through [`normalize_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub original_amount: f64,
    pub current_amount: f64,
    pub currency: String,
    pub description: String,
    pub payment_method: String,
    pub card_id: String,
}

pub fn standard_request_translator(request: &PaymentRequest) -> serde_json::Value {
    serde_json::json!(ChargePayload {
        amount: request.amount,
        currency: request.currency.clone(),
        description: request.description.clone(),
        card: request.card.clone(),
    })
}

pub fn standard_response_translator(body: &[u8]) -> Result<Payment, serde_json::Error> {
    let response: ProviderPayment = serde_json::from_slice(body)?;
    Ok(Payment {
        id: response.id,
        created_at: response.created_at,
        status: normalize_status(&response.status),
        original_amount: response.original_amount,
        current_amount: response.current_amount,
        currency: response.currency,
        description: response.description,
        payment_method: response.payment_method,
        card_id: response.card_id,
    })
}

/// Upstream status vocabulary to the domain state machine.
pub fn normalize_status(status: &str) -> PaymentStatus {
    match status {
        "authorized" | "paid" => PaymentStatus::Authorized,
        "refunded" | "voided" => PaymentStatus::Refunded,
        _ => PaymentStatus::Failed,
    }
}
