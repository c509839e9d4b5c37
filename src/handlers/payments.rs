use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::error::GatewayError;
use crate::models::payment::{Payment, PaymentRequest, RefundRequest};
use crate::services::PaymentService;

pub async fn create_payment(
    State(service): State<Arc<PaymentService>>,
    Json(payload): Json<Value>,
) -> Result<Json<Payment>, (StatusCode, Json<Value>)> {
    let request: PaymentRequest = parse_body(payload)?;

    service.process_payment(request).await.map(Json).map_err(|err| {
        error!("failed to process payment: {err}");
        error_response(&err)
    })
}

pub async fn refund_payment(
    State(service): State<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Payment>, (StatusCode, Json<Value>)> {
    let request: RefundRequest = parse_body(payload)?;

    service
        .refund_payment(&payment_id, request)
        .await
        .map(Json)
        .map_err(|err| {
            error!("failed to refund payment: {err}");
            error_response(&err)
        })
}

pub async fn get_payment(
    State(service): State<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>, (StatusCode, Json<Value>)> {
    service.get_payment(&payment_id).map(Json).map_err(|err| {
        error!("failed to get payment: {err}");
        error_response(&err)
    })
}

fn parse_body<T: DeserializeOwned>(payload: Value) -> Result<T, (StatusCode, Json<Value>)> {
    serde_json::from_value(payload).map_err(|err| {
        error!("invalid request body: {err}");
        error_response(&GatewayError::Validation(err.to_string()))
    })
}

fn error_response(err: &GatewayError) -> (StatusCode, Json<Value>) {
    let status = match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}
