//! JSON-over-HTTP surface for the order and payment services.
//!
//! Merchant calls identify the caller through the `x-actor-id` header,
//! which is expected to be set by an authenticating proxy in front of
//! this service. Customer calls carry no identity.

pub mod error;
pub mod orders;
pub mod payments;

use crate::application::order_service::OrderService;
use crate::application::payment_service::PaymentService;
use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

pub(crate) fn actor_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn health() -> &'static str {
    "ok"
}

/// Builds the full application router. Used by `serve` and by oneshot tests.
pub fn router(state: AppState) -> Router {
    let orders = Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/track/{order_number}", get(orders::track_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        .route("/orders/{id}/payments", get(orders::list_payments));

    // Webhook takes the raw body for signature checks.
    let payments = Router::new()
        .route("/payments/initialize", post(payments::initialize))
        .route("/payments/verify/{reference}", get(payments::verify))
        .route("/payments/webhook", post(payments::webhook));

    Router::new()
        .route("/health", get(health))
        .merge(orders)
        .merge(payments)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
