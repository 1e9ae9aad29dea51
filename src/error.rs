use crate::domain::order::OrderStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: u64,
        available: i64,
    },
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Merchant {0} has no active settlement account")]
    MerchantPaymentNotConfigured(String),
    #[error("Payment processor failure: {0}")]
    UpstreamFailure(String),
    #[error("Order number {0} already exists")]
    DuplicateOrderNumber(String),
    #[error("Payment reference {0} already exists")]
    DuplicateReference(String),
    #[error("Could not allocate a unique identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: u32 },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidState(_) => "invalid_state",
            EngineError::ValidationError(_) => "validation_error",
            EngineError::InsufficientStock { .. } => "insufficient_stock",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::AlreadyProcessed(_) => "already_processed",
            EngineError::InvalidSignature => "invalid_signature",
            EngineError::MerchantPaymentNotConfigured(_) => "merchant_payment_not_configured",
            EngineError::UpstreamFailure(_) => "upstream_failure",
            EngineError::DuplicateOrderNumber(_) | EngineError::DuplicateReference(_) => {
                "conflict"
            }
            EngineError::IdentifierExhausted { .. } => "identifier_exhausted",
            _ => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
