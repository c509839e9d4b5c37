mod app;
mod error;
mod handlers;
mod mock;
mod models;
mod services;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use app::config::Config;
use handlers::payments;
use mock::MockUpstream;
use services::provider::{
    standard_request_translator, standard_response_translator, HttpProvider, ProviderConfig,
};
use services::PaymentService;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    info!("starting payment gateway on port {}", config.server_port);

    // Two local fake upstreams stand in for the real providers.
    let primary_upstream = MockUpstream::new();
    tokio::spawn({
        let upstream = Arc::clone(&primary_upstream);
        async move { upstream.run("0.0.0.0:3001").await }
    });
    let fallback_upstream = MockUpstream::new();
    tokio::spawn({
        let upstream = Arc::clone(&fallback_upstream);
        async move { upstream.run("0.0.0.0:3002").await }
    });

    let stripe = HttpProvider::new(
        "stripe",
        ProviderConfig {
            name: "Stripe".to_string(),
            base_url: config.primary_provider_url.clone(),
            charge_endpoint: "/charges".to_string(),
            refund_endpoint: "/refund/{id}".to_string(),
            get_charge_endpoint: "/charges/{id}".to_string(),
            request_translator: standard_request_translator,
            response_translator: standard_response_translator,
        },
        config.http_timeout(),
    );
    let braintree = HttpProvider::new(
        "braintree",
        ProviderConfig {
            name: "Braintree".to_string(),
            base_url: config.fallback_provider_url.clone(),
            charge_endpoint: "/charges".to_string(),
            refund_endpoint: "/refund/{id}".to_string(),
            get_charge_endpoint: "/charges/{id}".to_string(),
            request_translator: standard_request_translator,
            response_translator: standard_response_translator,
        },
        config.http_timeout(),
    );

    let service = Arc::new(PaymentService::new(
        vec![Arc::new(stripe), Arc::new(braintree)],
        &config,
    ));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/payments", post(payments::create_payment))
        .route("/payments/{id}", get(payments::get_payment))
        .route("/refund/{id}", post(payments::refund_payment))
        .with_state(service);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("gateway listening on {addr}");

    axum::serve(listener, app).await.unwrap();
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
