use super::stock::{self, WorkingSet};
use crate::domain::catalog::{OrderableItem, Product, Storefront};
use crate::domain::order::{Cancellation, Order, StatusChange};
use crate::domain::payment::{Payment, PaymentConfirmation, PaymentFailure, ReconcileOutcome};
use crate::domain::ports::{CatalogAccessor, OrderRepository, PaymentRepository};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for storefront records.
pub const CF_STOREFRONTS: &str = "storefronts";
/// Column Family for products, variants included.
pub const CF_PRODUCTS: &str = "products";
/// Column Family for orders keyed by id.
pub const CF_ORDERS: &str = "orders";
/// Column Family mapping order numbers to order ids.
pub const CF_ORDER_NUMBERS: &str = "order_numbers";
/// Column Family for payments keyed by reference.
pub const CF_PAYMENTS: &str = "payments";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_STOREFRONTS,
    CF_PRODUCTS,
    CF_ORDERS,
    CF_ORDER_NUMBERS,
    CF_PAYMENTS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family as JSON. Multi-key commits
/// go through a single `WriteBatch`, and all read-modify-write sequences
/// are serialized by `write_lock` so conditional writes cannot interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family {name} not found"
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, cf: &str, key: &[u8]) -> Result<bool> {
        Ok(self.db.get_pinned_cf(self.cf(cf)?, key)?.is_some())
    }

    fn put<T: Serialize>(&self, batch: &mut WriteBatch, cf: &str, key: &[u8], value: &T) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn put_products(&self, batch: &mut WriteBatch, products: &WorkingSet) -> Result<()> {
        for (id, product) in products {
            self.put(batch, CF_PRODUCTS, id.as_bytes(), product)?;
        }
        Ok(())
    }

    fn load_product(&self, product_id: &str) -> Result<Option<Product>> {
        self.read(CF_PRODUCTS, product_id.as_bytes())
    }

    fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.read(CF_ORDERS, order_id.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(format!("Order {order_id}")))
    }

    fn load_payment(&self, reference: &str) -> Result<Payment> {
        self.read(CF_PAYMENTS, reference.as_bytes())?
            .ok_or_else(|| EngineError::NotFound(format!("Payment {reference}")))
    }
}

#[async_trait]
impl CatalogAccessor for RocksDBStore {
    async fn get_storefront(&self, store_id: &str) -> Result<Option<Storefront>> {
        self.read(CF_STOREFRONTS, store_id.as_bytes())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        self.load_product(product_id)
    }

    async fn get_orderable_item(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> Result<Option<OrderableItem>> {
        Ok(self
            .load_product(product_id)?
            .and_then(|product| product.orderable(variant_id)))
    }

    async fn adjust_stock(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
        delta: i64,
    ) -> Result<i64> {
        let _guard = self.write_lock.lock().await;
        let mut product = self
            .load_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Product {product_id}")))?;
        let remaining = product.adjust_stock(variant_id, delta)?;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PRODUCTS, product_id.as_bytes(), &product)?;
        self.db.write(batch)?;
        Ok(remaining)
    }

    async fn upsert_storefront(&self, storefront: Storefront) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_STOREFRONTS, storefront.id.as_bytes(), &storefront)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PRODUCTS, product.id.as_bytes(), &product)?;
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for RocksDBStore {
    async fn create_order_with_stock_adjustment(&self, order: Order) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        if self.exists(CF_ORDER_NUMBERS, order.order_number.as_bytes())? {
            return Err(EngineError::DuplicateOrderNumber(order.order_number));
        }
        let working = stock::reserve(&order, |id| self.load_product(id))?;

        let mut batch = WriteBatch::default();
        self.put_products(&mut batch, &working)?;
        self.put(&mut batch, CF_ORDERS, order.id.as_bytes(), &order)?;
        batch.put_cf(
            self.cf(CF_ORDER_NUMBERS)?,
            order.order_number.as_bytes(),
            order.id.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(order)
    }

    async fn restore_stock_and_cancel(
        &self,
        order_id: Uuid,
        cancellation: Cancellation,
    ) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.load_order(order_id)?;
        order.apply_cancellation(&cancellation)?;
        let working = stock::release(&order, |id| self.load_product(id))?;

        let mut batch = WriteBatch::default();
        self.put_products(&mut batch, &working)?;
        self.put(&mut batch, CF_ORDERS, order_id.as_bytes(), &order)?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn transition_status(&self, order_id: Uuid, change: StatusChange) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.load_order(order_id)?;
        order.apply_change(&change)?;

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_ORDERS, order_id.as_bytes(), &order)?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        self.read(CF_ORDERS, order_id.as_bytes())
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let Some(id) = self.db.get_cf(self.cf(CF_ORDER_NUMBERS)?, order_number.as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&id).map_err(|e| EngineError::InternalError(Box::new(e)))?;
        self.read(CF_ORDERS, id.as_bytes())
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        self.exists(CF_ORDER_NUMBERS, order_number.as_bytes())
    }
}

#[async_trait]
impl PaymentRepository for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.exists(CF_PAYMENTS, payment.reference.as_bytes())? {
            return Err(EngineError::DuplicateReference(payment.reference));
        }
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PAYMENTS, payment.reference.as_bytes(), &payment)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, reference.as_bytes())
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool> {
        self.exists(CF_PAYMENTS, reference.as_bytes())
    }

    async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_PAYMENTS)?, IteratorMode::Start) {
            let (_key, value) = item?;
            let payment: Payment = serde_json::from_slice(&value)?;
            if payment.order_id == order_id {
                payments.push(payment);
            }
        }
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn reconcile_payment_if_pending(
        &self,
        reference: &str,
        confirmation: PaymentConfirmation,
    ) -> Result<ReconcileOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut payment = self.load_payment(reference)?;
        if !payment.complete(&confirmation) {
            return Ok(ReconcileOutcome::AlreadyProcessed { payment });
        }
        let mut order = self.load_order(payment.order_id)?;
        let advanced = order.mark_paid(reference, confirmation.at);

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PAYMENTS, reference.as_bytes(), &payment)?;
        self.put(&mut batch, CF_ORDERS, order.id.as_bytes(), &order)?;
        self.db.write(batch)?;
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
        let _guard = self.write_lock.lock().await;
        let mut payment = self.load_payment(reference)?;
        if !payment.fail(&failure) {
            return Ok(ReconcileOutcome::AlreadyProcessed { payment });
        }
        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_PAYMENTS, reference.as_bytes(), &payment)?;
        self.db.write(batch)?;
        Ok(ReconcileOutcome::Failed { payment })
    }
}
