pub mod circuit_breaker;
pub mod ledger;
pub mod payment_service;
pub mod provider;
pub mod retry;

pub use payment_service::PaymentService;
