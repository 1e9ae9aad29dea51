use super::catalog::ProductSnapshot;
use super::money::{Money, Quantity};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Accepted,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Completed,
    Failed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    /// Statuses a merchant may move an order to from `self`.
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Placed => &[Accepted, Cancelled],
            Accepted => &[Preparing, Cancelled],
            Preparing => &[ReadyForPickup, OutForDelivery, Cancelled],
            ReadyForPickup => &[Completed, Cancelled],
            OutForDelivery => &[Delivered, Failed],
            Delivered => &[Completed, Disputed],
            Completed => &[Disputed],
            Failed => &[Placed],
            Cancelled | Disputed => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Cancellation is a separate rule from the merchant transition table.
    pub fn is_cancellable(self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Disputed => "DISPUTED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CashOnDelivery,
    Online,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    Pickup,
    MerchantDelivery,
    CustomerArranged,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct DeliveryDetails {
    pub method: DeliveryMethod,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl DeliveryDetails {
    pub fn pickup() -> Self {
        Self {
            method: DeliveryMethod::Pickup,
            address: None,
            city: None,
            instructions: None,
        }
    }

    /// Address and city are mandatory exactly when the merchant delivers.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        if self.method != DeliveryMethod::MerchantDelivery {
            return Vec::new();
        }
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.address) {
            missing.push("address");
        }
        if blank(&self.city) {
            missing.push("city");
        }
        missing
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CustomerContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CustomerContact {
    pub fn phone_matches(&self, phone: &str) -> bool {
        let wanted = normalize_phone(phone);
        !wanted.is_empty() && normalize_phone(&self.phone) == wanted
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|own| own.trim().eq_ignore_ascii_case(email.trim()))
    }
}

/// Digits only, with a leading `+` kept so international and local forms
/// of the same number do not collide.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut out: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        out.insert(0, '+');
    }
    out
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub subtotal: Money,
    pub tracks_inventory: bool,
    pub snapshot: ProductSnapshot,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    pub fn compute(subtotal: Money, delivery_fee: Money, tax: Money, discount: Money) -> Self {
        Self {
            subtotal,
            delivery_fee,
            tax,
            discount,
            total: (subtotal + delivery_fee + tax).saturating_sub(discount),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct OrderTimestamps {
    pub accepted_at: Option<DateTime<Utc>>,
    pub prepared_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderTimestamps {
    /// Stamps the field that belongs to `status`, once.
    fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Accepted => &mut self.accepted_at,
            OrderStatus::Preparing => &mut self.prepared_at,
            OrderStatus::ReadyForPickup => &mut self.ready_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Completed => &mut self.completed_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            _ => return,
        };
        slot.get_or_insert(at);
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub store_id: String,
    pub merchant_id: String,
    pub customer: CustomerContact,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub delivery: DeliveryDetails,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub timestamps: OrderTimestamps,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to place an order, after catalog resolution.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub store_id: String,
    pub merchant_id: String,
    pub customer: CustomerContact,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub delivery: DeliveryDetails,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl Order {
    pub fn place(new: NewOrder, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: new.order_number,
            store_id: new.store_id,
            merchant_id: new.merchant_id,
            customer: new.customer,
            items: new.items,
            totals: new.totals,
            delivery: new.delivery,
            status: OrderStatus::Placed,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Placed,
                at,
                note: Some(new.notes.unwrap_or_else(|| "Order placed".to_string())),
            }],
            payment_method: new.payment_method,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            timestamps: OrderTimestamps::default(),
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Moves to `status`, appending history and stamping the matching
    /// timestamp. Callers are responsible for checking the move is legal.
    pub fn record_status(&mut self, status: OrderStatus, note: Option<String>, at: DateTime<Utc>) {
        // Keep history monotonic even if the clock steps backwards.
        let at = self
            .status_history
            .last()
            .map_or(at, |last| at.max(last.at));
        self.status = status;
        self.status_history.push(StatusHistoryEntry { status, at, note });
        self.timestamps.stamp(status, at);
        self.updated_at = at;
    }

    pub fn tracked_lines(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.tracks_inventory)
    }

    /// Compare-and-set step of a merchant status change.
    pub fn apply_change(&mut self, change: &StatusChange) -> Result<(), EngineError> {
        if self.status != change.expected || !self.status.can_transition_to(change.next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: change.next,
            });
        }
        self.record_status(change.next, change.note.clone(), change.at);
        Ok(())
    }

    /// Compare-and-set step of a cancellation. Stock is the caller's job.
    pub fn apply_cancellation(&mut self, cancellation: &Cancellation) -> Result<(), EngineError> {
        if self.status != cancellation.expected || !self.status.is_cancellable() {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }
        self.cancellation_reason = cancellation.reason.clone();
        self.record_status(
            OrderStatus::Cancelled,
            cancellation.reason.clone(),
            cancellation.at,
        );
        Ok(())
    }

    /// Records a confirmed payment. An order whose fulfilment has not started
    /// yet moves to PREPARING; returns whether that happened.
    pub fn mark_paid(&mut self, reference: &str, at: DateTime<Utc>) -> bool {
        self.payment_status = PaymentStatus::Completed;
        self.paid_at.get_or_insert(at);
        self.updated_at = self.updated_at.max(at);
        if matches!(self.status, OrderStatus::Placed | OrderStatus::Accepted) {
            self.record_status(
                OrderStatus::Preparing,
                Some(format!("Payment {reference} confirmed")),
                at,
            );
            true
        } else {
            false
        }
    }
}

/// A requested status move, applied only if the order is still in `expected`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub expected: OrderStatus,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALL: [OrderStatus; 10] = [
        OrderStatus::Placed,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Failed,
        OrderStatus::Cancelled,
        OrderStatus::Disputed,
    ];

    #[test]
    fn test_transition_table() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Accepted));
        assert!(OrderStatus::Failed.can_transition_to(OrderStatus::Placed));
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Disputed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_cancellable_statuses() {
        let cancellable: Vec<_> = ALL.into_iter().filter(|s| s.is_cancellable()).collect();
        assert!(!cancellable.contains(&OrderStatus::Delivered));
        assert!(!cancellable.contains(&OrderStatus::Completed));
        assert!(!cancellable.contains(&OrderStatus::Cancelled));
        assert_eq!(cancellable.len(), 7);
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"READY_FOR_PICKUP\"");
        assert_eq!(OrderStatus::ReadyForPickup.to_string(), "READY_FOR_PICKUP");
    }

    #[test]
    fn test_delivery_required_fields() {
        let mut delivery = DeliveryDetails {
            method: DeliveryMethod::MerchantDelivery,
            address: Some("12 Marina".to_string()),
            city: Some("  ".to_string()),
            instructions: None,
        };
        assert_eq!(delivery.missing_required_fields(), vec!["city"]);
        delivery.method = DeliveryMethod::CustomerArranged;
        assert!(delivery.missing_required_fields().is_empty());
    }

    #[test]
    fn test_phone_matching_ignores_formatting() {
        let customer = CustomerContact {
            name: "Ada".to_string(),
            phone: "+234 801-234 5678".to_string(),
            email: Some("Ada@Example.com".to_string()),
        };
        assert!(customer.phone_matches("+2348012345678"));
        assert!(!customer.phone_matches("08012345678"));
        assert!(!customer.phone_matches(""));
        assert!(customer.email_matches("ada@example.com "));
    }

    #[test]
    fn test_totals() {
        use rust_decimal_macros::dec;
        let m = |d| Money::new(d).unwrap();
        let totals = OrderTotals::compute(m(dec!(20)), m(dec!(5)), Money::ZERO, m(dec!(3)));
        assert_eq!(totals.total, m(dec!(22)));
    }

    fn sample_order() -> Order {
        Order::place(
            NewOrder {
                order_number: "ORD-2".to_string(),
                store_id: "s1".to_string(),
                merchant_id: "m1".to_string(),
                customer: CustomerContact {
                    name: "Ada".to_string(),
                    phone: "1".to_string(),
                    email: None,
                },
                items: vec![],
                totals: OrderTotals::compute(Money::ZERO, Money::ZERO, Money::ZERO, Money::ZERO),
                delivery: DeliveryDetails::pickup(),
                payment_method: PaymentMethod::Online,
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_record_status_stamps_once_and_keeps_history_monotonic() {
        let now = Utc::now();
        let mut order = Order::place(
            NewOrder {
                order_number: "ORD-1".to_string(),
                store_id: "s1".to_string(),
                merchant_id: "m1".to_string(),
                customer: CustomerContact {
                    name: "Ada".to_string(),
                    phone: "1".to_string(),
                    email: None,
                },
                items: vec![],
                totals: OrderTotals::compute(Money::ZERO, Money::ZERO, Money::ZERO, Money::ZERO),
                delivery: DeliveryDetails::pickup(),
                payment_method: PaymentMethod::CashOnDelivery,
                notes: None,
            },
            now,
        );

        order.record_status(OrderStatus::Accepted, None, now - Duration::seconds(10));
        assert_eq!(order.status_history.len(), 2);
        assert!(order.status_history[1].at >= order.status_history[0].at);
        let first_accept = order.timestamps.accepted_at;
        assert!(first_accept.is_some());

        order.record_status(OrderStatus::Accepted, None, now + Duration::seconds(5));
        assert_eq!(order.timestamps.accepted_at, first_accept);
        assert!(order.timestamps.cancelled_at.is_none());
    }

    #[test]
    fn test_apply_change_is_compare_and_set() {
        let mut order = sample_order();
        let stale = StatusChange {
            expected: OrderStatus::Accepted,
            next: OrderStatus::Preparing,
            note: None,
            at: Utc::now(),
        };
        assert!(matches!(
            order.apply_change(&stale),
            Err(EngineError::InvalidTransition { .. })
        ));
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn test_mark_paid_advances_unstarted_orders_only() {
        let mut order = sample_order();
        assert!(order.mark_paid("REF-1", Utc::now()));
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert!(order.timestamps.prepared_at.is_some());

        let mut cancelled = sample_order();
        cancelled
            .apply_cancellation(&Cancellation {
                expected: OrderStatus::Placed,
                reason: Some("changed my mind".to_string()),
                at: Utc::now(),
            })
            .unwrap();
        assert!(!cancelled.mark_paid("REF-2", Utc::now()));
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Completed);
    }
}
