//! Payment dispatch core: provider selection, failover, refund routing and
//! the payment state machine.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::config::Config;
use crate::error::GatewayError;
use crate::models::payment::{Payment, PaymentRequest, PaymentStatus, RefundRequest, Transaction};
use crate::services::circuit_breaker::{CircuitBreaker, Settings};
use crate::services::ledger::Ledger;
use crate::services::provider::PaymentProvider;
use crate::services::retry::{self, RetryPolicy};

pub struct PaymentService {
    /// Failover priority is the declared order.
    providers: Vec<Arc<dyn PaymentProvider>>,
    breaker: CircuitBreaker,
    ledger: Ledger,
    retry: RetryPolicy,
}

impl PaymentService {
    /// Panics if `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn PaymentProvider>>, config: &Config) -> Self {
        assert!(
            !providers.is_empty(),
            "at least one payment provider is required"
        );
        let breaker = CircuitBreaker::new(Settings {
            name: "payment-provider".to_string(),
            max_requests: config.circuit_breaker.max_requests,
            interval: config.circuit_breaker_interval(),
            timeout: config.circuit_breaker_timeout(),
            min_requests: config.circuit_breaker.min_requests,
            failure_ratio: config.circuit_breaker.failure_ratio,
        });
        Self {
            providers,
            breaker,
            ledger: Ledger::new(),
            retry: RetryPolicy {
                attempts: config.retry.attempts,
                delay: config.retry_delay(),
            },
        }
    }

    /// Try each provider in order until one authorizes the payment. Failover
    /// is strictly sequential; a provider that succeeds is never called
    /// again for the same request.
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<Payment, GatewayError> {
        let mut last_err: Option<GatewayError> = None;
        for provider in &self.providers {
            info!(
                "[provider: {}] attempting to process payment",
                provider.name()
            );
            let outcome = self
                .guarded_call(provider.name(), || {
                    let provider = Arc::clone(provider);
                    let request = request.clone();
                    async move {
                        let payment = provider.process_payment(&request).await?;
                        reject_failed(provider.name(), payment)
                    }
                })
                .await;

            match outcome {
                Ok(payment) => {
                    info!(
                        "[provider: {}] payment successfully processed",
                        provider.name()
                    );
                    self.ledger.put(
                        &payment.id,
                        Transaction {
                            payment: payment.clone(),
                            provider_id: provider.id().to_string(),
                            provider_name: provider.name().to_string(),
                        },
                    );
                    return Ok(payment);
                }
                Err(err) => {
                    warn!("[provider: {}] failed: {err}", provider.name());
                    // Keep a diagnostic record when the upstream produced a
                    // payment object for the failed attempt.
                    if let GatewayError::Rejected { payment, .. } = &err {
                        let mut failed = (**payment).clone();
                        failed.status = PaymentStatus::Failed;
                        let id = failed.id.clone();
                        self.ledger.put(
                            &id,
                            Transaction {
                                payment: failed,
                                provider_id: provider.id().to_string(),
                                provider_name: provider.name().to_string(),
                            },
                        );
                    }
                    last_err = Some(err);
                }
            }
        }

        let last = last_err.expect("provider list is never empty");
        Err(GatewayError::AllProvidersFailed(Box::new(last)))
    }

    /// Refund through the provider that authorized the payment. Never fails
    /// over: only the original provider can refund its own charge.
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        request: RefundRequest,
    ) -> Result<Payment, GatewayError> {
        let transaction = self
            .ledger
            .get(payment_id)
            .ok_or_else(|| GatewayError::PaymentNotFound(payment_id.to_string()))?;

        if transaction.payment.status != PaymentStatus::Authorized {
            return Err(GatewayError::InvalidState(transaction.payment.status));
        }

        let provider = self
            .providers
            .iter()
            .find(|provider| provider.id() == transaction.provider_id)
            .ok_or_else(|| GatewayError::ProviderMissing(transaction.provider_id.clone()))?;

        info!(
            "[provider: {}] attempting to refund payment",
            provider.name()
        );
        let outcome = self
            .guarded_call(provider.name(), || {
                let provider = Arc::clone(provider);
                let request = request.clone();
                async move {
                    let payment = provider.refund_payment(payment_id, &request).await?;
                    reject_failed(provider.name(), payment)
                }
            })
            .await;

        match outcome {
            Ok(mut payment) => {
                info!(
                    "[provider: {}] refund successfully processed",
                    provider.name()
                );
                payment.status = PaymentStatus::Refunded;
                self.ledger.put(
                    payment_id,
                    Transaction {
                        payment: payment.clone(),
                        provider_id: transaction.provider_id.clone(),
                        provider_name: transaction.provider_name.clone(),
                    },
                );
                Ok(payment)
            }
            Err(err) => {
                warn!("[provider: {}] refund failed: {err}", provider.name());
                if let GatewayError::Rejected { payment, .. } = &err {
                    let mut failed = (**payment).clone();
                    failed.status = PaymentStatus::Failed;
                    self.ledger.put(
                        payment_id,
                        Transaction {
                            payment: failed,
                            provider_id: transaction.provider_id.clone(),
                            provider_name: transaction.provider_name.clone(),
                        },
                    );
                }
                Err(err)
            }
        }
    }

    /// Latest cached snapshot; never re-queries the upstream.
    pub fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        self.ledger
            .get(payment_id)
            .map(|transaction| transaction.payment)
            .ok_or_else(|| GatewayError::PaymentNotFound(payment_id.to_string()))
    }

    /// One breaker sample wraps the whole retry batch for a provider, so a
    /// provider that exhausts its retries counts as a single failure.
    async fn guarded_call<F, Fut>(
        &self,
        provider_name: &str,
        operation: F,
    ) -> Result<Payment, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Payment, GatewayError>>,
    {
        let policy = &self.retry;
        self.breaker
            .execute(move || async move { retry::run(policy, provider_name, operation).await })
            .await
    }
}

/// A 200 response whose body did not reach the expected state is a failure
/// that produced a payment object; surface it carrying the payment so the
/// dispatcher can ledger the diagnostic record.
fn reject_failed(provider: &str, payment: Payment) -> Result<Payment, GatewayError> {
    if payment.status == PaymentStatus::Failed {
        return Err(GatewayError::Rejected {
            provider: provider.to_string(),
            payment: Box::new(payment),
        });
    }
    Ok(payment)
}
