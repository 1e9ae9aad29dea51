//! Folds the two confirmation paths (signed webhook and client poll) into
//! one idempotent transition keyed by payment reference.

use super::side_effects::SideEffects;
use crate::domain::events::{AuditAction, AuditEntry, LifecycleEvent};
use crate::domain::order::OrderStatus;
use crate::domain::payment::{
    PaymentConfirmation, PaymentFailure, ReconcileOutcome, VerificationChannel,
};
use crate::domain::ports::PaymentRepositoryRef;
use crate::error::{EngineError, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

/// A processor-confirmed successful charge, whichever path reported it.
#[derive(Debug, Clone)]
pub struct ChargeSucceeded {
    pub reference: String,
    /// Minor currency units, as reported by the processor.
    pub amount: i64,
    pub payload: serde_json::Value,
    pub channel: VerificationChannel,
}

#[derive(Clone)]
pub struct Reconciler {
    payments: PaymentRepositoryRef,
    effects: SideEffects,
}

impl Reconciler {
    pub fn new(payments: PaymentRepositoryRef, effects: SideEffects) -> Self {
        Self { payments, effects }
    }

    /// Applies a success signal at most once per reference. The PENDING
    /// guard lives in the repository's conditional write, not in this read.
    #[instrument(skip(self, signal), fields(reference = %signal.reference, channel = ?signal.channel))]
    pub async fn apply(&self, signal: ChargeSucceeded) -> Result<ReconcileOutcome> {
        let payment = self
            .payments
            .get_by_reference(&signal.reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Payment {}", signal.reference)))?;

        let expected = payment.amount.to_minor_units();
        let outcome = if expected != Some(signal.amount) {
            error!(
                expected = ?expected,
                reported = signal.amount,
                "Processor amount does not match payment record"
            );
            self.payments
                .fail_payment_if_pending(
                    &signal.reference,
                    PaymentFailure {
                        channel: signal.channel,
                        reason: format!(
                            "Amount mismatch: expected {:?}, processor reported {}",
                            expected, signal.amount
                        ),
                        payload: signal.payload,
                        at: Utc::now(),
                    },
                )
                .await?
        } else {
            self.payments
                .reconcile_payment_if_pending(
                    &signal.reference,
                    PaymentConfirmation {
                        channel: signal.channel,
                        payload: signal.payload,
                        at: Utc::now(),
                    },
                )
                .await?
        };

        match &outcome {
            ReconcileOutcome::Completed {
                payment,
                order,
                advanced,
            } => {
                info!(order_id = %order.id, advanced, "Payment completed");
                if order.status == OrderStatus::Cancelled {
                    warn!(order_id = %order.id, "Payment settled on a cancelled order; refund is handled outside the engine");
                }
                self.effects.notify(LifecycleEvent::PaymentConfirmed {
                    order_id: order.id,
                    payment_ref: payment.reference.clone(),
                    amount: payment.amount,
                });
                if *advanced {
                    self.effects.notify(LifecycleEvent::StatusChanged {
                        order_id: order.id,
                        new_status: OrderStatus::Preparing,
                        note: Some("Payment confirmed".to_string()),
                    });
                }
                self.effects
                    .audit(
                        AuditEntry::payment(AuditAction::PaymentCompleted, &payment.reference)
                            .change(json!({"status": "PENDING"}), json!({"status": payment.status}))
                            .with_metadata(json!({
                                "order_id": order.id,
                                "channel": signal.channel,
                                "order_status": order.status,
                            })),
                    )
                    .await;
            }
            ReconcileOutcome::Failed { payment } => {
                self.effects
                    .audit(
                        AuditEntry::payment(AuditAction::PaymentFailed, &payment.reference)
                            .change(json!({"status": "PENDING"}), json!({"status": payment.status}))
                            .with_metadata(json!({
                                "order_id": payment.order_id,
                                "channel": signal.channel,
                                "reason": payment.failure_reason,
                            })),
                    )
                    .await;
            }
            ReconcileOutcome::AlreadyProcessed { payment } => {
                debug!(status = ?payment.status, "Payment already reconciled, nothing to do");
            }
        }

        Ok(outcome)
    }
}
