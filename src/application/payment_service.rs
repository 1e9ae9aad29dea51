use super::identifiers::{allocate_unique, payment_reference};
use super::reconcile::{ChargeSucceeded, Reconciler};
use super::side_effects::SideEffects;
use super::signature::WebhookSigner;
use crate::domain::events::{AuditAction, AuditEntry};
use crate::domain::order::{OrderStatus, PaymentStatus};
use crate::domain::payment::{Payment, ReconcileOutcome, VerificationChannel};
use crate::domain::ports::{
    ChargeStatus, InitializeTransaction, MerchantDirectoryRef, OrderRepositoryRef,
    PaymentProcessorRef, PaymentRepositoryRef,
};
use crate::error::{EngineError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";

#[derive(Debug, Clone, Deserialize)]
pub struct InitializePayment {
    pub order_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentInitialization {
    pub redirect_url: String,
    pub reference: String,
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Verification {
    pub verified: bool,
    /// True when another caller had already settled this payment.
    pub already_processed: bool,
    pub payment: Payment,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    Processed,
    AlreadyProcessed,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub default_callback_url: Option<String>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "NGN".to_string(),
            default_callback_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    reference: String,
    amount: i64,
}

/// Opens processor transactions and reconciles their outcome.
pub struct PaymentService {
    orders: OrderRepositoryRef,
    payments: PaymentRepositoryRef,
    merchants: MerchantDirectoryRef,
    processor: PaymentProcessorRef,
    signer: WebhookSigner,
    reconciler: Reconciler,
    settings: PaymentSettings,
    effects: SideEffects,
}

impl PaymentService {
    pub fn new(
        orders: OrderRepositoryRef,
        payments: PaymentRepositoryRef,
        merchants: MerchantDirectoryRef,
        processor: PaymentProcessorRef,
        signer: WebhookSigner,
        settings: PaymentSettings,
        effects: SideEffects,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(payments.clone(), effects.clone()),
            orders,
            payments,
            merchants,
            processor,
            signer,
            settings,
            effects,
        }
    }

    /// Opens a transaction on the merchant's sub-account and records a
    /// PENDING payment. The order itself is not touched.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn initialize_payment(
        &self,
        request: InitializePayment,
    ) -> Result<PaymentInitialization> {
        let order = self
            .orders
            .get(request.order_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Order {}", request.order_id)))?;

        let email_ok = request
            .email
            .as_deref()
            .is_some_and(|e| order.customer.email_matches(e));
        let phone_ok = request
            .phone
            .as_deref()
            .is_some_and(|p| order.customer.phone_matches(p));
        if !email_ok && !phone_ok {
            return Err(EngineError::Forbidden(
                "Contact details do not match the order".to_string(),
            ));
        }

        if order.payment_status == PaymentStatus::Completed {
            return Err(EngineError::AlreadyProcessed(format!(
                "Order {} is already paid",
                order.order_number
            )));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(EngineError::InvalidState(format!(
                "Order {} is cancelled",
                order.order_number
            )));
        }

        let account = self
            .merchants
            .settlement_account(&order.merchant_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or_else(|| EngineError::MerchantPaymentNotConfigured(order.merchant_id.clone()))?;

        let payer_email = request
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| order.customer.email.clone())
            .ok_or_else(|| {
                EngineError::ValidationError("An email is required for online payment".to_string())
            })?;

        let amount = order.totals.total.to_minor_units().ok_or_else(|| {
            EngineError::ValidationError(format!("Order total {} is out of range", order.totals.total))
        })?;

        let reference = allocate_unique(
            |attempt| payment_reference(&order.order_number, Utc::now(), attempt),
            |candidate| {
                let payments = self.payments.clone();
                async move { payments.reference_exists(&candidate).await }
            },
        )
        .await?;

        let initialized = self
            .processor
            .initialize_transaction(InitializeTransaction {
                reference: reference.clone(),
                email: payer_email,
                amount,
                currency: self.settings.currency.clone(),
                subaccount: account.subaccount_code.clone(),
                callback_url: request
                    .callback_url
                    .or_else(|| self.settings.default_callback_url.clone()),
                metadata: json!({
                    "order_id": order.id,
                    "order_number": order.order_number,
                }),
            })
            .await?;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            reference: reference.clone(),
            amount: order.totals.total,
            currency: self.settings.currency.clone(),
            subaccount_code: account.subaccount_code,
            status: PaymentStatus::Pending,
            authorization_url: initialized.authorization_url.clone(),
            verified_via_webhook: false,
            verified_via_poll: false,
            raw_payload: None,
            failure_reason: None,
            created_at: now,
            paid_at: None,
            updated_at: now,
        };
        self.payments.insert(payment).await?;

        info!(%reference, amount, "Payment initialized");
        self.effects
            .audit(
                AuditEntry::payment(AuditAction::PaymentInitialized, &reference)
                    .change(serde_json::Value::Null, json!({"status": PaymentStatus::Pending}))
                    .with_metadata(json!({
                        "order_id": order.id,
                        "amount": order.totals.total,
                        "currency": self.settings.currency,
                    })),
            )
            .await;

        Ok(PaymentInitialization {
            redirect_url: initialized.authorization_url,
            reference,
            access_code: initialized.access_code,
        })
    }

    /// Client-driven poll: asks the processor, then runs the same reducer
    /// as the webhook path.
    #[instrument(skip(self))]
    pub async fn verify_payment(&self, reference: &str) -> Result<Verification> {
        let payment = self
            .payments
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Payment {reference}")))?;
        if !payment.is_pending() {
            return Ok(Verification {
                verified: payment.status == PaymentStatus::Completed,
                already_processed: true,
                payment,
            });
        }

        let transaction = self.processor.verify_transaction(reference).await?;
        if transaction.status != ChargeStatus::Success {
            info!(status = ?transaction.status, "Processor has not confirmed the charge");
            return Ok(Verification {
                verified: false,
                already_processed: false,
                payment,
            });
        }

        let outcome = self
            .reconciler
            .apply(ChargeSucceeded {
                reference: reference.to_string(),
                amount: transaction.amount,
                payload: transaction.payload,
                channel: VerificationChannel::Poll,
            })
            .await?;
        Ok(verification_from(outcome))
    }

    /// Signed, at-least-once processor notification. The signature is
    /// checked against `raw_body` exactly as received.
    #[instrument(skip(self, signature, raw_body), fields(bytes = raw_body.len()))]
    pub async fn handle_webhook(&self, signature: Option<&str>, raw_body: &[u8]) -> Result<WebhookAck> {
        let signature = signature.ok_or(EngineError::InvalidSignature)?;
        if let Err(e) = self.signer.verify(signature, raw_body) {
            warn!("Rejected webhook with bad signature");
            return Err(e);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| EngineError::ValidationError(format!("Malformed webhook body: {e}")))?;

        if envelope.event != CHARGE_SUCCESS_EVENT {
            info!(event = %envelope.event, "Webhook event acknowledged without state change");
            return Ok(WebhookAck::Ignored);
        }

        let charge: ChargeData = serde_json::from_value(envelope.data)
            .map_err(|e| EngineError::ValidationError(format!("Malformed charge data: {e}")))?;
        let payload: serde_json::Value = serde_json::from_slice(raw_body)?;

        let outcome = self
            .reconciler
            .apply(ChargeSucceeded {
                reference: charge.reference,
                amount: charge.amount,
                payload,
                channel: VerificationChannel::Webhook,
            })
            .await?;

        Ok(match outcome {
            ReconcileOutcome::Completed { .. } | ReconcileOutcome::Failed { .. } => {
                WebhookAck::Processed
            }
            ReconcileOutcome::AlreadyProcessed { .. } => WebhookAck::AlreadyProcessed,
        })
    }

    pub async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>> {
        self.payments.list_for_order(order_id).await
    }
}

fn verification_from(outcome: ReconcileOutcome) -> Verification {
    match outcome {
        ReconcileOutcome::Completed { payment, .. } => Verification {
            verified: true,
            already_processed: false,
            payment,
        },
        ReconcileOutcome::Failed { payment } => Verification {
            verified: false,
            already_processed: false,
            payment,
        },
        ReconcileOutcome::AlreadyProcessed { payment } => Verification {
            verified: payment.status == PaymentStatus::Completed,
            already_processed: true,
            payment,
        },
    }
}
