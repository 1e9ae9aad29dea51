use super::money::Money;
use super::order::{Order, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which reconciliation path observed the processor's confirmation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Webhook,
    Poll,
}

/// One attempt at collecting an order's total through the processor.
///
/// Never deleted; a retry creates a new record with a new reference.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Idempotency key shared with the processor.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub subaccount_code: String,
    pub status: PaymentStatus,
    pub authorization_url: String,
    pub verified_via_webhook: bool,
    pub verified_via_poll: bool,
    pub raw_payload: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// PENDING -> COMPLETED. Returns false, changing nothing, from any other status.
    pub fn complete(&mut self, confirmation: &PaymentConfirmation) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = PaymentStatus::Completed;
        self.paid_at = Some(confirmation.at);
        self.updated_at = confirmation.at;
        self.raw_payload = Some(confirmation.payload.clone());
        match confirmation.channel {
            VerificationChannel::Webhook => self.verified_via_webhook = true,
            VerificationChannel::Poll => self.verified_via_poll = true,
        }
        true
    }

    /// PENDING -> FAILED. Returns false, changing nothing, from any other status.
    pub fn fail(&mut self, failure: &PaymentFailure) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(failure.reason.clone());
        self.raw_payload = Some(failure.payload.clone());
        self.updated_at = failure.at;
        true
    }
}

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub channel: VerificationChannel,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaymentFailure {
    pub channel: VerificationChannel,
    pub reason: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Result of a PENDING-guarded reconciliation write.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// This caller won the race and applied the change. `advanced` is set
    /// when the order was moved to PREPARING by the same commit.
    Completed {
        payment: Payment,
        order: Order,
        advanced: bool,
    },
    Failed { payment: Payment },
    /// Another caller got there first; nothing was written.
    AlreadyProcessed { payment: Payment },
}

impl ReconcileOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            ReconcileOutcome::Completed { payment, .. }
            | ReconcileOutcome::Failed { payment }
            | ReconcileOutcome::AlreadyProcessed { payment } => payment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending() -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            reference: "ORD-1-1".to_string(),
            amount: Money::new(dec!(20)).unwrap(),
            currency: "NGN".to_string(),
            subaccount_code: "ACCT_1".to_string(),
            status: PaymentStatus::Pending,
            authorization_url: "https://pay.example/1".to_string(),
            verified_via_webhook: false,
            verified_via_poll: false,
            raw_payload: None,
            failure_reason: None,
            created_at: now,
            paid_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_complete_is_one_shot() {
        let mut payment = pending();
        let confirmation = PaymentConfirmation {
            channel: VerificationChannel::Webhook,
            payload: serde_json::json!({"event": "charge.success"}),
            at: Utc::now(),
        };
        assert!(payment.complete(&confirmation));
        assert!(payment.verified_via_webhook);
        assert!(!payment.verified_via_poll);

        let poll = PaymentConfirmation {
            channel: VerificationChannel::Poll,
            ..confirmation
        };
        assert!(!payment.complete(&poll));
        assert!(!payment.verified_via_poll);
    }

    #[test]
    fn test_completed_payment_cannot_fail() {
        let mut payment = pending();
        payment.status = PaymentStatus::Completed;
        let failure = PaymentFailure {
            channel: VerificationChannel::Poll,
            reason: "amount mismatch".to_string(),
            payload: serde_json::Value::Null,
            at: Utc::now(),
        };
        assert!(!payment.fail(&failure));
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.failure_reason.is_none());
    }
}
