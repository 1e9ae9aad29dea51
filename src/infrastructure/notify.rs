use crate::domain::events::{AuditEntry, LifecycleEvent};
use crate::domain::ports::{AuditSink, NotificationDispatcher};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Emits lifecycle events as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, event: LifecycleEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        info!(target: "orderflow::events", order_id = %event.order_id(), %payload, "Lifecycle event");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry)?;
        info!(target: "orderflow::audit", action = ?entry.action, entity_id = %entry.entity_id, %payload, "Audit");
        Ok(())
    }
}

/// Keeps every audit entry and event in memory so they can be inspected.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    events: Arc<RwLock<Vec<LifecycleEvent>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn events(&self) -> Vec<LifecycleEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryAuditLog {
    async fn dispatch(&self, event: LifecycleEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
