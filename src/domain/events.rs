use super::money::Money;
use super::order::OrderStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages handed to the notification collaborator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        merchant_id: String,
        total: Money,
    },
    StatusChanged {
        order_id: Uuid,
        new_status: OrderStatus,
        note: Option<String>,
    },
    PaymentConfirmed {
        order_id: Uuid,
        payment_ref: String,
        amount: Money,
    },
}

impl LifecycleEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            LifecycleEvent::OrderPlaced { order_id, .. }
            | LifecycleEvent::StatusChanged { order_id, .. }
            | LifecycleEvent::PaymentConfirmed { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrderCreated,
    OrderStatusUpdated,
    OrderCancelled,
    PaymentInitialized,
    PaymentCompleted,
    PaymentFailed,
}

/// One row of the append-only audit trail.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<String>,
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn order(action: AuditAction, order_id: Uuid) -> Self {
        Self {
            actor_id: None,
            action,
            entity: "order".to_string(),
            entity_id: order_id.to_string(),
            old_value: None,
            new_value: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn payment(action: AuditAction, reference: &str) -> Self {
        Self {
            actor_id: None,
            action,
            entity: "payment".to_string(),
            entity_id: reference.to_string(),
            old_value: None,
            new_value: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn by(mut self, actor_id: Option<&str>) -> Self {
        self.actor_id = actor_id.map(str::to_string);
        self
    }

    pub fn change(mut self, old: serde_json::Value, new: serde_json::Value) -> Self {
        self.old_value = Some(old);
        self.new_value = Some(new);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
