use crate::domain::events::{AuditEntry, LifecycleEvent};
use crate::domain::ports::{AuditSinkRef, NotificationDispatcherRef};
use tracing::warn;

/// Best-effort fan-out to the notification and audit collaborators.
///
/// Only called after a transition has committed. Failures are logged and
/// swallowed; they never reach the caller.
#[derive(Clone)]
pub struct SideEffects {
    notifier: NotificationDispatcherRef,
    audit: AuditSinkRef,
}

impl SideEffects {
    pub fn new(notifier: NotificationDispatcherRef, audit: AuditSinkRef) -> Self {
        Self { notifier, audit }
    }

    /// Hands the event to the dispatcher on a background task.
    pub fn notify(&self, event: LifecycleEvent) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let order_id = event.order_id();
            if let Err(e) = notifier.dispatch(event).await {
                warn!(%order_id, error = %e, "Notification dispatch failed");
            }
        });
    }

    pub async fn audit(&self, entry: AuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id.clone();
        if let Err(e) = self.audit.record(entry).await {
            warn!(?action, %entity_id, error = %e, "Audit record failed");
        }
    }
}
