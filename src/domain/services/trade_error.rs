//! Ledger errors with kind, code and transport mapping

use crate::domain::errors::ValidationError;
use crate::domain::repositories::ledger_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Record type an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Investor,
    Stock,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Investor => write!(f, "Investor"),
            EntityKind::Stock => write!(f, "Stock"),
        }
    }
}

/// Error returned by settlement, registry and portfolio operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradeError {
    /// Investor or stock id does not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// Buy cost exceeds the investor's balance
    #[error("Insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    /// Buy exceeds unsold inventory, or sell exceeds the investor's holding
    #[error("Insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: u64, available: u64 },

    /// Sell attempted without any holding in the stock
    #[error("Investor {investor_id} does not own stock {stock_id}")]
    DoesNotOwn {
        investor_id: String,
        stock_id: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Registration with a name that is already taken
    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: EntityKind, name: String },

    /// Store write or read failed; the operation was rolled back
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Ledger found in a state that breaks its invariants
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InsufficientFunds,
    InsufficientShares,
    DoesNotOwn,
    InvalidInput,
    AlreadyExists,
    PersistenceFailure,
    Internal,
}

/// Severity levels for ledger errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Caller mistake, expected to occur routinely
    Minor,
    /// Business rule rejection
    Moderate,
    /// Storage or integrity problem that needs attention
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Minor => write!(f, "Minor"),
            ErrorSeverity::Moderate => write!(f, "Moderate"),
            ErrorSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// Structured error handed to the request layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    /// Same request may succeed if sent again
    pub retryable: bool,
}

impl TradeError {
    pub fn not_found(entity: EntityKind, id: &str) -> Self {
        TradeError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TradeError::NotFound { .. } => ErrorKind::NotFound,
            TradeError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TradeError::InsufficientShares { .. } => ErrorKind::InsufficientShares,
            TradeError::DoesNotOwn { .. } => ErrorKind::DoesNotOwn,
            TradeError::InvalidInput(_) => ErrorKind::InvalidInput,
            TradeError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            TradeError::Persistence(_) => ErrorKind::PersistenceFailure,
            TradeError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TradeError::NotFound { .. } => ErrorSeverity::Minor,
            TradeError::InvalidInput(_) => ErrorSeverity::Minor,
            TradeError::AlreadyExists { .. } => ErrorSeverity::Minor,
            TradeError::InsufficientFunds { .. } => ErrorSeverity::Moderate,
            TradeError::InsufficientShares { .. } => ErrorSeverity::Moderate,
            TradeError::DoesNotOwn { .. } => ErrorSeverity::Moderate,
            TradeError::Persistence(_) => ErrorSeverity::Critical,
            TradeError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Check if retrying the same request might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TradeError::Persistence(_))
    }

    /// Get a short error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            TradeError::NotFound { .. } => "ERR_NOT_FOUND",
            TradeError::InsufficientFunds { .. } => "ERR_INSUFFICIENT_FUNDS",
            TradeError::InsufficientShares { .. } => "ERR_INSUFFICIENT_SHARES",
            TradeError::DoesNotOwn { .. } => "ERR_DOES_NOT_OWN",
            TradeError::InvalidInput(_) => "ERR_INVALID_INPUT",
            TradeError::AlreadyExists { .. } => "ERR_ALREADY_EXISTS",
            TradeError::Persistence(_) => "ERR_PERSISTENCE",
            TradeError::Internal(_) => "ERR_INTERNAL",
        }
    }

    /// Status code the HTTP layer answers with
    pub fn http_status(&self) -> u16 {
        match self {
            TradeError::NotFound { .. } => 404,
            TradeError::InsufficientFunds { .. }
            | TradeError::InsufficientShares { .. }
            | TradeError::DoesNotOwn { .. }
            | TradeError::InvalidInput(_) => 400,
            TradeError::AlreadyExists { .. } => 409,
            TradeError::Persistence(_) | TradeError::Internal(_) => 500,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            code: self.error_code(),
            message: self.to_string(),
            retryable: self.is_recoverable(),
        }
    }
}

impl From<StoreError> for TradeError {
    fn from(error: StoreError) -> Self {
        TradeError::Persistence(error.to_string())
    }
}

impl From<ValidationError> for TradeError {
    fn from(error: ValidationError) -> Self {
        TradeError::InvalidInput(error.to_string())
    }
}
