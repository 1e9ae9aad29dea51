use super::AppState;
use crate::application::payment_service::{
    InitializePayment, PaymentInitialization, Verification,
};
use crate::error::Result;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

pub const SIGNATURE_HEADER: &str = "x-signature";

pub async fn initialize(
    State(state): State<AppState>,
    Json(request): Json<InitializePayment>,
) -> Result<(StatusCode, Json<PaymentInitialization>)> {
    let initialized = state.payments.initialize_payment(request).await?;
    Ok((StatusCode::CREATED, Json(initialized)))
}

pub async fn verify(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<Verification>> {
    Ok(Json(state.payments.verify_payment(&reference).await?))
}

/// Takes the body as raw bytes; the signature covers them exactly as sent.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    // Redelivery of a settled charge is still a 200 for the sender.
    let ack = state.payments.handle_webhook(signature, &body).await?;
    Ok(Json(json!({ "status": ack })))
}
