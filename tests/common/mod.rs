#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use orderflow::application::delivery::CityFeeTable;
use orderflow::application::order_service::{CartLine, OrderService, PlaceOrder};
use orderflow::application::payment_service::{InitializePayment, PaymentService, PaymentSettings};
use orderflow::application::side_effects::SideEffects;
use orderflow::application::signature::WebhookSigner;
use orderflow::domain::catalog::{Product, ProductSpecs, StoreCategory, Storefront, Variant};
use orderflow::domain::events::{AuditEntry, LifecycleEvent};
use orderflow::domain::money::Money;
use orderflow::domain::order::{CustomerContact, DeliveryDetails, Order, PaymentMethod};
use orderflow::domain::ports::{AuditSink, CatalogAccessor, NotificationDispatcher, SettlementAccount};
use orderflow::error::{EngineError, Result};
use orderflow::infrastructure::directory::InMemoryDirectory;
use orderflow::infrastructure::in_memory::InMemoryStore;
use orderflow::infrastructure::notify::InMemoryAuditLog;
use orderflow::infrastructure::sandbox::SandboxProcessor;
use orderflow::interfaces::http::{self, AppState};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &str = "whsec_test_secret";
pub const STORE: &str = "s1";
pub const MERCHANT: &str = "m1";
pub const OWNER: &str = "u-owner";
pub const STRANGER: &str = "u-stranger";
pub const PRODUCT: &str = "p1";
pub const SHIRT: &str = "p2";
pub const LARGE: &str = "p2-large";
pub const UNTRACKED: &str = "p3";
pub const PHONE: &str = "0803 000 0000";
pub const EMAIL: &str = "ada@example.com";

pub fn money(value: Decimal) -> Money {
    Money::new(value).unwrap()
}

/// Fully wired services over an in-memory store, a recording audit log
/// and the sandbox processor.
pub struct Fixture {
    pub store: InMemoryStore,
    pub directory: InMemoryDirectory,
    pub sandbox: SandboxProcessor,
    pub log: InMemoryAuditLog,
    pub signer: WebhookSigner,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::linked(Self::unlinked().await).await
    }

    /// Wired to a notifier and audit sink that fail every call.
    pub async fn with_broken_side_effects() -> Self {
        let broken = Arc::new(BrokenSink);
        let effects = SideEffects::new(broken.clone(), broken);
        Self::linked(Self::assemble(effects, InMemoryAuditLog::new()).await).await
    }

    async fn linked(fixture: Self) -> Self {
        fixture
            .directory
            .link_settlement(
                MERCHANT,
                SettlementAccount {
                    subaccount_code: "ACCT_m1".to_string(),
                    is_active: true,
                },
            )
            .await;
        fixture
    }

    /// Same catalog, but the merchant has no settlement account.
    pub async fn unlinked() -> Self {
        let log = InMemoryAuditLog::new();
        let effects = SideEffects::new(Arc::new(log.clone()), Arc::new(log.clone()));
        Self::assemble(effects, log).await
    }

    async fn assemble(effects: SideEffects, log: InMemoryAuditLog) -> Self {
        let store = InMemoryStore::new();
        seed_catalog(&store).await;

        let directory = InMemoryDirectory::new();
        directory.grant(OWNER, MERCHANT).await;
        directory.grant(STRANGER, "m-other").await;

        let sandbox = SandboxProcessor::default();
        let signer = WebhookSigner::new(SECRET);

        let orders = OrderService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(CityFeeTable::standard()),
            effects.clone(),
        );
        let payments = PaymentService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(sandbox.clone()),
            WebhookSigner::new(SECRET),
            PaymentSettings::default(),
            effects,
        );

        Self {
            store,
            directory,
            sandbox,
            log,
            signer,
            orders: Arc::new(orders),
            payments: Arc::new(payments),
        }
    }

    pub fn app(&self) -> Router {
        http::router(AppState {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
        })
    }

    pub async fn stock(&self, product_id: &str) -> i64 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    pub async fn variant_stock(&self, product_id: &str, variant_id: &str) -> i64 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .variant(variant_id)
            .unwrap()
            .stock
    }

    pub async fn place(&self, quantity: u32) -> Order {
        self.orders
            .create_order(place_request(vec![line(PRODUCT, quantity)]))
            .await
            .unwrap()
    }

    /// Opens a payment for `order` and returns its reference.
    pub async fn open_payment(&self, order: &Order) -> String {
        self.payments
            .initialize_payment(InitializePayment {
                order_id: order.id,
                email: Some(EMAIL.to_string()),
                phone: None,
                callback_url: None,
            })
            .await
            .unwrap()
            .reference
    }

    pub fn sign(&self, body: &[u8]) -> String {
        self.signer.sign(body).unwrap()
    }

    /// Lets spawned notification tasks run.
    pub async fn drain_effects(&self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Notifier and audit sink whose every call fails.
pub struct BrokenSink;

#[async_trait]
impl NotificationDispatcher for BrokenSink {
    async fn dispatch(&self, _event: LifecycleEvent) -> Result<()> {
        Err(EngineError::UpstreamFailure("notifier offline".to_string()))
    }
}

#[async_trait]
impl AuditSink for BrokenSink {
    async fn record(&self, _entry: AuditEntry) -> Result<()> {
        Err(EngineError::UpstreamFailure("audit store offline".to_string()))
    }
}

pub fn line(product_id: &str, quantity: u32) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        variant_id: None,
        quantity,
    }
}

pub fn variant_line(product_id: &str, variant_id: &str, quantity: u32) -> CartLine {
    CartLine {
        variant_id: Some(variant_id.to_string()),
        ..line(product_id, quantity)
    }
}

pub fn customer() -> CustomerContact {
    CustomerContact {
        name: "Ada Obi".to_string(),
        phone: PHONE.to_string(),
        email: Some(EMAIL.to_string()),
    }
}

pub fn place_request(items: Vec<CartLine>) -> PlaceOrder {
    PlaceOrder {
        store_id: STORE.to_string(),
        items,
        customer: customer(),
        delivery: DeliveryDetails::pickup(),
        payment_method: PaymentMethod::CashOnDelivery,
        notes: None,
    }
}

/// A `charge.success` body with a trailing newline and odd spacing, so a
/// re-serialized copy would not match the signature.
pub fn charge_success(reference: &str, amount: i64) -> Vec<u8> {
    format!(
        "{{\"event\": \"charge.success\",  \"data\": {{\"reference\": \"{reference}\", \"amount\": {amount}, \"status\": \"success\"}}}}\n"
    )
    .into_bytes()
}

pub fn other_event(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "transfer.success",
        "data": {"reference": reference, "amount": 100}
    }))
    .unwrap()
}

pub fn product(id: &str, price: Decimal, stock: i64, tracks_inventory: bool) -> Product {
    Product {
        id: id.to_string(),
        store_id: STORE.to_string(),
        name: format!("Product {id}"),
        description: None,
        images: vec![],
        sku: None,
        price: money(price),
        tracks_inventory,
        stock,
        is_available: true,
        order_count: 0,
        specs: ProductSpecs::General,
        variants: vec![],
    }
}

async fn seed_catalog(store: &InMemoryStore) {
    store
        .upsert_storefront(Storefront {
            id: STORE.to_string(),
            merchant_id: MERCHANT.to_string(),
            name: "Ada's Kitchen".to_string(),
            category: StoreCategory::General,
            is_active: true,
            is_published: true,
        })
        .await
        .unwrap();

    store
        .upsert_product(product(PRODUCT, Decimal::new(1000, 2), 5, true))
        .await
        .unwrap();

    let mut shirt = product(SHIRT, Decimal::new(1000, 2), 10, true);
    shirt.variants.push(Variant {
        id: LARGE.to_string(),
        name: "Large".to_string(),
        price: Some(money(Decimal::new(1250, 2))),
        stock: 2,
        is_available: true,
    });
    store.upsert_product(shirt).await.unwrap();

    store
        .upsert_product(product(UNTRACKED, Decimal::new(500, 2), 0, false))
        .await
        .unwrap();
}
