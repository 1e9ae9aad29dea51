use crate::domain::ports::{
    ChargeStatus, InitializeTransaction, InitializedTransaction, PaymentProcessor,
    VerifiedTransaction,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Response wrapper used by every processor endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    reference: String,
    status: ChargeStatus,
    amount: i64,
}

fn upstream(e: impl std::fmt::Display) -> EngineError {
    EngineError::UpstreamFailure(e.to_string())
}

/// REST client for the hosted payment processor.
///
/// Every call is bounded by the client timeout; nothing is retried here.
#[derive(Debug, Clone)]
pub struct HttpPaymentProcessor {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentProcessor {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(upstream)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<(T, serde_json::Value)> {
        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(upstream)?;
        if !status.is_success() {
            return Err(EngineError::UpstreamFailure(format!(
                "processor returned {status}: {}",
                body["message"].as_str().unwrap_or("no message")
            )));
        }
        let envelope: Envelope<T> = serde_json::from_value(body.clone()).map_err(upstream)?;
        match envelope.data {
            Some(data) if envelope.status => Ok((data, body)),
            _ => Err(EngineError::UpstreamFailure(envelope.message)),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    #[instrument(skip(self, request), fields(reference = %request.reference))]
    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction> {
        let body = json!({
            "reference": request.reference,
            "email": request.email,
            "amount": request.amount,
            "currency": request.currency,
            "subaccount": request.subaccount,
            // Processor fees are charged to the platform account.
            "bearer": "account",
            "callback_url": request.callback_url,
            "metadata": request.metadata,
        });
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(upstream)?;
        let (data, _) = Self::unwrap_envelope::<InitializedTransaction>(response).await?;
        debug!("Processor transaction opened");
        Ok(data)
    }

    #[instrument(skip(self))]
    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(upstream)?;
        let (data, payload) = Self::unwrap_envelope::<VerifyData>(response).await?;
        if data.reference != reference {
            return Err(EngineError::UpstreamFailure(format!(
                "processor answered for {} instead of {reference}",
                data.reference
            )));
        }
        Ok(VerifiedTransaction {
            reference: data.reference,
            status: data.status,
            amount: data.amount,
            payload,
        })
    }
}
