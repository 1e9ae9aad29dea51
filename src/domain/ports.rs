use super::catalog::{OrderableItem, Product, Storefront};
use super::events::{AuditEntry, LifecycleEvent};
use super::money::Money;
use super::order::{Cancellation, DeliveryMethod, Order, StatusChange};
use super::payment::{Payment, PaymentConfirmation, PaymentFailure, ReconcileOutcome};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Read side of the catalog plus its atomic stock primitive.
#[async_trait]
pub trait CatalogAccessor: Send + Sync {
    async fn get_storefront(&self, store_id: &str) -> Result<Option<Storefront>>;
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>>;
    /// `Ok(None)` when the product, or the requested variant under it, is unknown.
    async fn get_orderable_item(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> Result<Option<OrderableItem>>;
    /// Atomic increment/decrement; refuses to take stock below zero.
    async fn adjust_stock(&self, product_id: &str, variant_id: Option<&str>, delta: i64)
    -> Result<i64>;
    async fn upsert_storefront(&self, storefront: Storefront) -> Result<()>;
    async fn upsert_product(&self, product: Product) -> Result<()>;
}

/// Unit of work for orders. Every method is one atomic commit.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Re-checks and decrements stock for every tracked line, bumps product
    /// order counters and inserts the order, or changes nothing.
    async fn create_order_with_stock_adjustment(&self, order: Order) -> Result<Order>;
    /// Cancels the order if it is still in `cancellation.expected` and
    /// restores stock for every tracked line in the same commit.
    async fn restore_stock_and_cancel(
        &self,
        order_id: Uuid,
        cancellation: Cancellation,
    ) -> Result<Order>;
    /// Compare-and-set on the order status.
    async fn transition_status(&self, order_id: Uuid, change: StatusChange) -> Result<Order>;
    async fn get(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>>;
    async fn order_number_exists(&self, order_number: &str) -> Result<bool>;
}

/// Unit of work for payment records.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>>;
    async fn reference_exists(&self, reference: &str) -> Result<bool>;
    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>>;
    /// PENDING -> COMPLETED on the payment, and in the same commit marks the
    /// order paid and advances it to PREPARING when it has not started yet.
    async fn reconcile_payment_if_pending(
        &self,
        reference: &str,
        confirmation: PaymentConfirmation,
    ) -> Result<ReconcileOutcome>;
    /// PENDING -> FAILED on the payment only.
    async fn fail_payment_if_pending(
        &self,
        reference: &str,
        failure: PaymentFailure,
    ) -> Result<ReconcileOutcome>;
}

#[async_trait]
pub trait AuthDirectory: Send + Sync {
    async fn resolve_actor_merchant(&self, actor_id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SettlementAccount {
    pub subaccount_code: String,
    pub is_active: bool,
}

#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    async fn settlement_account(&self, merchant_id: &str) -> Result<Option<SettlementAccount>>;
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct InitializeTransaction {
    pub reference: String,
    pub email: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub subaccount: String,
    pub callback_url: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Failed,
    Abandoned,
    #[serde(other)]
    Pending,
}

#[derive(Debug, PartialEq, Clone)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: ChargeStatus,
    /// Minor currency units.
    pub amount: i64,
    pub payload: serde_json::Value,
}

/// The external processor. Calls are bounded in time and never retried here.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction>;
    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: LifecycleEvent) -> Result<()>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

pub trait DeliveryFeePolicy: Send + Sync {
    fn fee_for(&self, method: DeliveryMethod, city: Option<&str>) -> Money;
}

pub type CatalogRef = Arc<dyn CatalogAccessor>;
pub type OrderRepositoryRef = Arc<dyn OrderRepository>;
pub type PaymentRepositoryRef = Arc<dyn PaymentRepository>;
pub type AuthDirectoryRef = Arc<dyn AuthDirectory>;
pub type MerchantDirectoryRef = Arc<dyn MerchantDirectory>;
pub type PaymentProcessorRef = Arc<dyn PaymentProcessor>;
pub type NotificationDispatcherRef = Arc<dyn NotificationDispatcher>;
pub type AuditSinkRef = Arc<dyn AuditSink>;
pub type DeliveryFeePolicyRef = Arc<dyn DeliveryFeePolicy>;
