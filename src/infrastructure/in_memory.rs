use super::stock;
use crate::domain::catalog::{OrderableItem, Product, Storefront};
use crate::domain::order::{Cancellation, Order, StatusChange};
use crate::domain::payment::{Payment, PaymentConfirmation, PaymentFailure, ReconcileOutcome};
use crate::domain::ports::{CatalogAccessor, OrderRepository, PaymentRepository};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    storefronts: HashMap<String, Storefront>,
    products: HashMap<String, Product>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashMap<String, Uuid>,
    payments: HashMap<String, Payment>,
}

/// A thread-safe in-memory store backing the catalog, orders and payments.
///
/// Every unit-of-work method runs under a single write lock, so each one is
/// atomic with respect to the others. `Clone` shares the underlying state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_order(order_id: Uuid) -> EngineError {
    EngineError::NotFound(format!("Order {order_id}"))
}

#[async_trait]
impl CatalogAccessor for InMemoryStore {
    async fn get_storefront(&self, store_id: &str) -> Result<Option<Storefront>> {
        let state = self.state.read().await;
        Ok(state.storefronts.get(store_id).cloned())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(product_id).cloned())
    }

    async fn get_orderable_item(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> Result<Option<OrderableItem>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .get(product_id)
            .and_then(|product| product.orderable(variant_id)))
    }

    async fn adjust_stock(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
        delta: i64,
    ) -> Result<i64> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| EngineError::NotFound(format!("Product {product_id}")))?;
        product.adjust_stock(variant_id, delta)
    }

    async fn upsert_storefront(&self, storefront: Storefront) -> Result<()> {
        let mut state = self.state.write().await;
        state.storefronts.insert(storefront.id.clone(), storefront);
        Ok(())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.clone(), product);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order_with_stock_adjustment(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.order_numbers.contains_key(&order.order_number) {
            return Err(EngineError::DuplicateOrderNumber(order.order_number));
        }
        let working = stock::reserve(&order, |id| Ok(state.products.get(id).cloned()))?;

        state.products.extend(working);
        state
            .order_numbers
            .insert(order.order_number.clone(), order.id);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn restore_stock_and_cancel(
        &self,
        order_id: Uuid,
        cancellation: Cancellation,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let mut order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| missing_order(order_id))?;
        order.apply_cancellation(&cancellation)?;
        let working = stock::release(&order, |id| Ok(state.products.get(id).cloned()))?;

        state.products.extend(working);
        state.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn transition_status(&self, order_id: Uuid, change: StatusChange) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| missing_order(order_id))?;
        order.apply_change(&change)?;
        Ok(order.clone())
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .order_numbers
            .get(order_number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.order_numbers.contains_key(order_number))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&payment.reference) {
            return Err(EngineError::DuplicateReference(payment.reference));
        }
        state.payments.insert(payment.reference.clone(), payment);
        Ok(())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(reference).cloned())
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.payments.contains_key(reference))
    }

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn reconcile_payment_if_pending(
        &self,
        reference: &str,
        confirmation: PaymentConfirmation,
    ) -> Result<ReconcileOutcome> {
        let mut state = self.state.write().await;
        let mut payment = state
            .payments
            .get(reference)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Payment {reference}")))?;
        if !payment.complete(&confirmation) {
            return Ok(ReconcileOutcome::AlreadyProcessed { payment });
        }
        let mut order = state
            .orders
            .get(&payment.order_id)
            .cloned()
            .ok_or_else(|| missing_order(payment.order_id))?;
        let advanced = order.mark_paid(reference, confirmation.at);

        state.orders.insert(order.id, order.clone());
        state.payments.insert(payment.reference.clone(), payment.clone());
        Ok(ReconcileOutcome::Completed {
            payment,
            order,
            advanced,
        })
    }

    async fn fail_payment_if_pending(
        &self,
        reference: &str,
        failure: PaymentFailure,
    ) -> Result<ReconcileOutcome> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(reference)
            .ok_or_else(|| EngineError::NotFound(format!("Payment {reference}")))?;
        let failed = payment.fail(&failure);
        let payment = payment.clone();
        Ok(if failed {
            ReconcileOutcome::Failed { payment }
        } else {
            ReconcileOutcome::AlreadyProcessed { payment }
        })
    }
}
