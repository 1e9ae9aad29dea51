use crate::domain::ports::{
    ChargeStatus, InitializeTransaction, InitializedTransaction, PaymentProcessor,
    VerifiedTransaction,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct SandboxCharge {
    request: InitializeTransaction,
    status: ChargeStatus,
    amount: i64,
}

/// Offline stand-in for the hosted processor.
///
/// Opened transactions stay `pending` until settled through the control
/// methods. Used by `serve --sandbox` and by the test suite.
#[derive(Clone)]
pub struct SandboxProcessor {
    checkout_base: String,
    charges: Arc<Mutex<HashMap<String, SandboxCharge>>>,
    unavailable: Arc<AtomicBool>,
    verify_calls: Arc<AtomicUsize>,
}

impl Default for SandboxProcessor {
    fn default() -> Self {
        Self::new("https://sandbox.invalid/checkout")
    }
}

impl SandboxProcessor {
    pub fn new(checkout_base: impl Into<String>) -> Self {
        Self {
            checkout_base: checkout_base.into(),
            charges: Arc::default(),
            unavailable: Arc::default(),
            verify_calls: Arc::default(),
        }
    }

    /// Makes every subsequent call fail as if the processor were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Marks the charge successful for the amount it was opened with.
    pub async fn settle(&self, reference: &str) -> Result<()> {
        self.set_outcome(reference, ChargeStatus::Success, None).await
    }

    /// Marks the charge successful but reports a different amount.
    pub async fn settle_with_amount(&self, reference: &str, amount: i64) -> Result<()> {
        self.set_outcome(reference, ChargeStatus::Success, Some(amount))
            .await
    }

    pub async fn set_outcome(
        &self,
        reference: &str,
        status: ChargeStatus,
        amount: Option<i64>,
    ) -> Result<()> {
        let mut charges = self.charges.lock().await;
        let charge = charges
            .get_mut(reference)
            .ok_or_else(|| EngineError::NotFound(format!("Sandbox charge {reference}")))?;
        charge.status = status;
        if let Some(amount) = amount {
            charge.amount = amount;
        }
        Ok(())
    }

    /// Requests received by `initialize_transaction`, in no particular order.
    pub async fn opened(&self) -> Vec<InitializeTransaction> {
        let charges = self.charges.lock().await;
        charges.values().map(|c| c.request.clone()).collect()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::UpstreamFailure(
                "sandbox processor unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProcessor for SandboxProcessor {
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction> {
        self.ensure_available()?;
        let mut charges = self.charges.lock().await;
        let reference = request.reference.clone();
        charges.insert(
            reference.clone(),
            SandboxCharge {
                amount: request.amount,
                request,
                status: ChargeStatus::Pending,
            },
        );
        Ok(InitializedTransaction {
            authorization_url: format!("{}/{}", self.checkout_base, reference),
            access_code: Some(format!("sandbox_{reference}")),
        })
    }

    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        let charges = self.charges.lock().await;
        let charge = charges
            .get(reference)
            .ok_or_else(|| EngineError::UpstreamFailure(format!("unknown reference {reference}")))?;
        Ok(VerifiedTransaction {
            reference: reference.to_string(),
            status: charge.status,
            amount: charge.amount,
            payload: json!({
                "status": true,
                "data": {
                    "reference": reference,
                    "status": charge.status,
                    "amount": charge.amount,
                    "currency": charge.request.currency,
                },
            }),
        })
    }
}
