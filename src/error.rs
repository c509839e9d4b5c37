use thiserror::Error;

use crate::models::payment::{Payment, PaymentStatus};

/// Everything that can go wrong between the ingress and the upstreams.
///
/// Adapter errors (`Transport`, `UpstreamStatus`, `Decode`, `Rejected`) carry
/// the provider name; the dispatcher wraps the terminal failure of the last
/// provider attempted into `AllProvidersFailed`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    #[error("payment cannot be refunded: status is {0}")]
    InvalidState(PaymentStatus),

    #[error("provider not found: {0}")]
    ProviderMissing(String),

    #[error("[provider: {provider}] error making request: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("[provider: {provider}] unexpected status code: {status}")]
    UpstreamStatus { provider: String, status: u16 },

    #[error("[provider: {provider}] error decoding response: {source}")]
    Decode {
        provider: String,
        #[source]
        source: serde_json::Error,
    },

    /// The upstream answered 200 but the body did not put the payment in the
    /// expected state. Carries the decoded payment so the dispatcher can keep
    /// a diagnostic record of the failed attempt.
    #[error("[provider: {provider}] payment rejected by upstream")]
    Rejected {
        provider: String,
        payment: Box<Payment>,
    },

    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("all providers failed, last error: {0}")]
    AllProvidersFailed(#[source] Box<GatewayError>),
}
