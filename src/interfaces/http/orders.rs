use super::{AppState, actor_id};
use crate::application::order_service::PlaceOrder;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::Payment;
use crate::error::{EngineError, Result};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub phone: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders.get_order(order_id).await?))
}

pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<Order>> {
    Ok(Json(
        state.orders.track_order(&order_number, &query.phone).await?,
    ))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let actor = actor_id(&headers)
        .ok_or_else(|| EngineError::Forbidden("Merchant identity required".to_string()))?;
    let order = state
        .orders
        .update_status(actor, order_id, update.status, update.notes)
        .await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Order>> {
    let reason = body.and_then(|Json(request)| request.reason);
    let order = state
        .orders
        .cancel_order(order_id, reason, actor_id(&headers))
        .await?;
    Ok(Json(order))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>> {
    state.orders.get_order(order_id).await?;
    Ok(Json(state.payments.payments_for_order(order_id).await?))
}
