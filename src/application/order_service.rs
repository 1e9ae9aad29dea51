use super::identifiers::{MAX_ALLOCATION_ATTEMPTS, OrderNumberGenerator};
use super::side_effects::SideEffects;
use crate::domain::catalog::OrderableItem;
use crate::domain::events::{AuditAction, AuditEntry, LifecycleEvent};
use crate::domain::money::{Money, Quantity};
use crate::domain::order::{
    Cancellation, CustomerContact, DeliveryDetails, NewOrder, Order, OrderItem, OrderStatus,
    OrderTotals, PaymentMethod, PaymentStatus, StatusChange,
};
use crate::domain::ports::{AuthDirectoryRef, CatalogRef, DeliveryFeePolicyRef, OrderRepositoryRef};
use crate::error::{EngineError, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub store_id: String,
    pub items: Vec<CartLine>,
    pub customer: CustomerContact,
    pub delivery: DeliveryDetails,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Creates orders against the catalog and drives their status machine.
pub struct OrderService {
    catalog: CatalogRef,
    orders: OrderRepositoryRef,
    auth: AuthDirectoryRef,
    fees: DeliveryFeePolicyRef,
    numbers: OrderNumberGenerator,
    effects: SideEffects,
}

impl OrderService {
    pub fn new(
        catalog: CatalogRef,
        orders: OrderRepositoryRef,
        auth: AuthDirectoryRef,
        fees: DeliveryFeePolicyRef,
        effects: SideEffects,
    ) -> Self {
        Self {
            catalog,
            orders,
            auth,
            fees,
            numbers: OrderNumberGenerator::default(),
            effects,
        }
    }

    pub fn with_number_generator(mut self, numbers: OrderNumberGenerator) -> Self {
        self.numbers = numbers;
        self
    }

    /// Validates the cart, prices it, and commits the order together with
    /// its stock decrements. Nothing is written unless every check passes.
    #[instrument(skip(self, request), fields(store_id = %request.store_id, lines = request.items.len()))]
    pub async fn create_order(&self, request: PlaceOrder) -> Result<Order> {
        if request.items.is_empty() {
            return Err(EngineError::ValidationError(
                "An order needs at least one item".to_string(),
            ));
        }
        if request.customer.phone.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "Customer phone is required".to_string(),
            ));
        }

        let storefront = self
            .catalog
            .get_storefront(&request.store_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Store {}", request.store_id)))?;
        if !storefront.is_orderable() {
            return Err(EngineError::InvalidState(format!(
                "Store {} is not accepting orders",
                storefront.id
            )));
        }

        let missing = request.delivery.missing_required_fields();
        if !missing.is_empty() {
            return Err(EngineError::ValidationError(format!(
                "Merchant delivery requires: {}",
                missing.join(", ")
            )));
        }

        let mut resolved = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let quantity = Quantity::new(line.quantity)?;
            let item = self.resolve_line(&request.store_id, line).await?;
            resolved.push((item, quantity));
        }

        // The same product/variant may appear on several lines.
        // Summed as u64: several near-u32::MAX lines must not wrap.
        let mut demand: HashMap<(&str, Option<&str>), (u64, &OrderableItem)> = HashMap::new();
        for (item, quantity) in &resolved {
            let entry = demand
                .entry((item.product_id.as_str(), item.variant_id.as_deref()))
                .or_insert((0, item));
            entry.0 += u64::from(quantity.value());
        }
        for (requested, item) in demand.values() {
            let short = i64::try_from(*requested).map_or(true, |r| item.available_qty < r);
            if item.tracks_inventory && short {
                return Err(EngineError::InsufficientStock {
                    item: item.label(),
                    requested: *requested,
                    available: item.available_qty,
                });
            }
        }

        let items: Vec<OrderItem> = resolved
            .into_iter()
            .map(|(item, quantity)| OrderItem {
                subtotal: item.price * quantity,
                product_id: item.product_id,
                variant_id: item.variant_id,
                product_name: item.snapshot.name.clone(),
                variant_name: item.variant_name,
                unit_price: item.price,
                quantity,
                tracks_inventory: item.tracks_inventory,
                snapshot: item.snapshot,
            })
            .collect();

        let subtotal: Money = items.iter().map(|i| i.subtotal).sum();
        let delivery_fee = self
            .fees
            .fee_for(request.delivery.method, request.delivery.city.as_deref());
        let totals = OrderTotals::compute(subtotal, delivery_fee, Money::ZERO, Money::ZERO);

        let order = self
            .commit_new_order(NewOrder {
                order_number: String::new(),
                store_id: storefront.id.clone(),
                merchant_id: storefront.merchant_id.clone(),
                customer: request.customer,
                items,
                totals,
                delivery: request.delivery,
                payment_method: request.payment_method,
                notes: request.notes,
            })
            .await?;

        info!(order_id = %order.id, order_number = %order.order_number, total = %order.totals.total, "Order placed");

        self.effects.notify(LifecycleEvent::OrderPlaced {
            order_id: order.id,
            order_number: order.order_number.clone(),
            merchant_id: order.merchant_id.clone(),
            total: order.totals.total,
        });
        self.effects
            .audit(
                AuditEntry::order(AuditAction::OrderCreated, order.id)
                    .change(
                        serde_json::Value::Null,
                        json!({"status": order.status, "total": order.totals.total}),
                    )
                    .with_metadata(json!({
                        "order_number": order.order_number,
                        "store_id": order.store_id,
                        "lines": order.items.len(),
                    })),
            )
            .await;

        Ok(order)
    }

    async fn resolve_line(&self, store_id: &str, line: &CartLine) -> Result<OrderableItem> {
        let variant_id = line.variant_id.as_deref();
        let Some(item) = self
            .catalog
            .get_orderable_item(&line.product_id, variant_id)
            .await?
        else {
            let product = self.catalog.get_product(&line.product_id).await?;
            return Err(match (product, variant_id) {
                (Some(_), Some(variant)) => EngineError::NotFound(format!(
                    "Variant {} of product {}",
                    variant, line.product_id
                )),
                _ => EngineError::NotFound(format!("Product {}", line.product_id)),
            });
        };

        if item.store_id != store_id {
            return Err(EngineError::NotFound(format!(
                "Product {} in store {}",
                line.product_id, store_id
            )));
        }
        if !item.product_available {
            return Err(EngineError::InvalidState(format!(
                "{} is not available",
                item.snapshot.name
            )));
        }
        if item.variant_available == Some(false) {
            return Err(EngineError::InvalidState(format!(
                "{} is not available",
                item.label()
            )));
        }
        Ok(item)
    }

    /// Allocates a number and commits. A number taken between the
    /// existence check and the commit costs one more attempt.
    async fn commit_new_order(&self, template: NewOrder) -> Result<Order> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let number = self
                .numbers
                .allocate(|candidate| {
                    let orders = self.orders.clone();
                    async move { orders.order_number_exists(&candidate).await }
                })
                .await?;

            let order = Order::place(
                NewOrder {
                    order_number: number,
                    ..template.clone()
                },
                Utc::now(),
            );
            match self.orders.create_order_with_stock_adjustment(order).await {
                Err(EngineError::DuplicateOrderNumber(number)) => {
                    warn!(%number, "Order number taken at commit, retrying");
                }
                other => return other,
            }
        }
        Err(EngineError::IdentifierExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Order {order_id}")))
    }

    /// Public tracking by order number. A phone that does not match is
    /// reported exactly like an unknown number.
    #[instrument(skip(self, phone))]
    pub async fn track_order(&self, order_number: &str, phone: &str) -> Result<Order> {
        self.orders
            .find_by_number(order_number)
            .await?
            .filter(|order| order.customer.phone_matches(phone))
            .ok_or_else(|| EngineError::NotFound(format!("Order {order_number}")))
    }

    async fn ensure_owner(&self, actor_id: &str, order: &Order) -> Result<()> {
        match self.auth.resolve_actor_merchant(actor_id).await? {
            Some(merchant_id) if merchant_id == order.merchant_id => Ok(()),
            _ => Err(EngineError::Forbidden(format!(
                "Actor {actor_id} does not own order {}",
                order.id
            ))),
        }
    }

    #[instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        actor_id: &str,
        order_id: Uuid,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        self.ensure_owner(actor_id, &order).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(EngineError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }
        if new_status == OrderStatus::Cancelled {
            return self.commit_cancellation(order, notes, Some(actor_id)).await;
        }

        let previous = order.status;
        let updated = self
            .orders
            .transition_status(
                order_id,
                StatusChange {
                    expected: previous,
                    next: new_status,
                    note: notes.clone(),
                    at: Utc::now(),
                },
            )
            .await?;

        info!(%order_id, from = %previous, to = %new_status, "Order status updated");

        self.effects.notify(LifecycleEvent::StatusChanged {
            order_id,
            new_status,
            note: notes,
        });
        self.effects
            .audit(
                AuditEntry::order(AuditAction::OrderStatusUpdated, order_id)
                    .by(Some(actor_id))
                    .change(json!({"status": previous}), json!({"status": new_status})),
            )
            .await;

        Ok(updated)
    }

    /// Customers may cancel while the order is PLACED; after that only the
    /// owning merchant can.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<String>,
        actor_id: Option<&str>,
    ) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if !order.status.is_cancellable() {
            return Err(EngineError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        if order.status != OrderStatus::Placed {
            let actor = actor_id.ok_or_else(|| {
                EngineError::Forbidden(format!(
                    "Only the merchant can cancel an order that is {}",
                    order.status
                ))
            })?;
            self.ensure_owner(actor, &order).await?;
        }
        self.commit_cancellation(order, reason, actor_id).await
    }

    async fn commit_cancellation(
        &self,
        order: Order,
        reason: Option<String>,
        actor_id: Option<&str>,
    ) -> Result<Order> {
        let previous = order.status;
        let cancelled = self
            .orders
            .restore_stock_and_cancel(
                order.id,
                Cancellation {
                    expected: previous,
                    reason: reason.clone(),
                    at: Utc::now(),
                },
            )
            .await?;

        info!(order_id = %order.id, from = %previous, "Order cancelled");
        if cancelled.payment_status == PaymentStatus::Completed {
            warn!(order_id = %order.id, "Cancelled order was already paid; refund is handled outside the engine");
        }

        self.effects.notify(LifecycleEvent::StatusChanged {
            order_id: order.id,
            new_status: OrderStatus::Cancelled,
            note: reason.clone(),
        });
        self.effects
            .audit(
                AuditEntry::order(AuditAction::OrderCancelled, order.id)
                    .by(actor_id)
                    .change(
                        json!({"status": previous}),
                        json!({"status": OrderStatus::Cancelled}),
                    )
                    .with_metadata(json!({
                        "reason": reason,
                        "restocked_lines": cancelled.tracked_lines().count(),
                    })),
            )
            .await;

        Ok(cancelled)
    }
}
