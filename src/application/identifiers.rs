use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;

/// Upper bound on collision retries before giving up loudly.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 8;

// No 0/O or 1/I, so numbers survive being read out over the phone.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 6;

/// Produces human-readable order numbers such as `ORD-261017-K7XQ2D`.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("ORD")
    }
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn candidate(&self, at: DateTime<Utc>) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}-{}-{}", self.prefix, at.format("%y%m%d"), suffix)
    }

    /// Draws candidates until `exists` reports a free one.
    pub async fn allocate<F, Fut>(&self, exists: F) -> Result<String>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        allocate_unique(|_| self.candidate(Utc::now()), exists).await
    }
}

/// Payment reference derived from the order number and a microsecond clock.
pub fn payment_reference(order_number: &str, at: DateTime<Utc>, attempt: u32) -> String {
    let base = format!("{}-{}", order_number, at.timestamp_micros());
    if attempt == 0 {
        base
    } else {
        format!("{base}-{attempt}")
    }
}

/// Generic bounded retry-on-collision loop.
pub async fn allocate_unique<C, F, Fut>(mut candidate: C, mut exists: F) -> Result<String>
where
    C: FnMut(u32) -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let value = candidate(attempt);
        if !exists(value.clone()).await? {
            return Ok(value);
        }
        tracing::debug!(attempt, candidate = %value, "Identifier collision, retrying");
    }
    Err(EngineError::IdentifierExhausted {
        attempts: MAX_ALLOCATION_ATTEMPTS,
    })
}
