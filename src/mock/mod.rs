//! In-memory fake upstream used for local runs and end-to-end tests. Speaks
//! the standard provider wire format.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

use crate::models::payment::RefundRequest;
use crate::services::provider::{ChargePayload, ProviderPayment};

pub struct MockUpstream {
    payments: DashMap<String, ProviderPayment>,
    failure_mode: AtomicBool,
}

impl MockUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payments: DashMap::new(),
            failure_mode: AtomicBool::new(false),
        })
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/charges", post(handle_charge))
            .route("/refund/{id}", post(handle_refund))
            .route("/charges/{id}", get(handle_get_charge))
            .with_state(self)
    }

    pub async fn run(self: Arc<Self>, addr: &str) {
        let listener = TcpListener::bind(addr).await.unwrap();
        info!("mock upstream listening on {addr}");
        axum::serve(listener, self.router()).await.unwrap();
    }

    /// While enabled, every charge answers 503.
    pub fn set_failure_mode(&self, enabled: bool) {
        self.failure_mode.store(enabled, Ordering::Relaxed);
    }
}

async fn handle_charge(
    State(upstream): State<Arc<MockUpstream>>,
    Json(payload): Json<ChargePayload>,
) -> Result<Json<ProviderPayment>, (StatusCode, Json<Value>)> {
    if upstream.failure_mode.load(Ordering::Relaxed) {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "service unavailable" })),
        ));
    }

    // Simulate processing delay.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let payment = ProviderPayment {
        id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        status: "authorized".to_string(),
        original_amount: payload.amount,
        current_amount: payload.amount,
        currency: payload.currency,
        description: payload.description,
        payment_method: "card".to_string(),
        card_id: Uuid::new_v4().to_string(),
    };
    upstream
        .payments
        .insert(payment.id.clone(), payment.clone());

    Ok(Json(payment))
}

async fn handle_refund(
    State(upstream): State<Arc<MockUpstream>>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ProviderPayment>, (StatusCode, Json<Value>)> {
    let Some(mut payment) = upstream.payments.get_mut(&id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "payment not found" })),
        ));
    };

    payment.status = "refunded".to_string();
    payment.current_amount -= request.amount;

    Ok(Json(payment.value().clone()))
}

async fn handle_get_charge(
    State(upstream): State<Arc<MockUpstream>>,
    Path(id): Path<String>,
) -> Result<Json<ProviderPayment>, (StatusCode, Json<Value>)> {
    match upstream.payments.get(&id) {
        Some(payment) => Ok(Json(payment.value().clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "payment not found" })),
        )),
    }
}
