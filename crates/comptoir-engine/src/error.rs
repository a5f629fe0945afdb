//! # Engine Error Type
//!
//! Unified error type for engine operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Error Flow in Comptoir                              │
//! │                                                                         │
//! │  Caller                      Engine                                     │
//! │  ──────                      ──────                                     │
//! │                                                                         │
//! │  create_sale(request)                                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Validation Error? ── CoreError::Validation ── rejected before   │  │
//! │  │         │                                      any I/O           │  │
//! │  │         ▼                                                        │  │
//! │  │  Business Rule?    ── CoreError::InsufficientStock etc. ──────►  │  │
//! │  │         │             (transaction rolled back, never retried)   │  │
//! │  │         ▼                                                        │  │
//! │  │  SQLITE_BUSY?      ── DbError::Busy ── retried with backoff,     │  │
//! │  │         │             surfaces StorageContention when exhausted  │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────► │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  err.reason_code()     → "INSUFFICIENT_STOCK" (stable, machine-read)   │
//! │  err.is_client_error() → true (caller's fault) / false (ours)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use comptoir_core::CoreError;
use comptoir_db::DbError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule or validation rule rejected the request.
    /// The transaction, if any, was rolled back.
    #[error(transparent)]
    Business(#[from] CoreError),

    /// The store stayed contended through every retry attempt.
    #[error("Storage contention persisted after {attempts} attempts")]
    StorageContention { attempts: u32 },

    /// A storage failure that is not a business outcome.
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl EngineError {
    /// Stable machine-readable reason code.
    ///
    /// ## Usage
    /// API layers map these to their own error bodies; the strings never
    /// change meaning between releases.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::Business(e) => match e {
                CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
                CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
                CoreError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
                CoreError::InsufficientLoyaltyPoints { .. } => "INSUFFICIENT_LOYALTY_POINTS",
                CoreError::NegativeTotal { .. } => "NEGATIVE_TOTAL",
                CoreError::SaleNotFound(_) => "SALE_NOT_FOUND",
                CoreError::SaleItemNotFound(_) => "SALE_ITEM_NOT_FOUND",
                CoreError::AlreadyRefunded(_) => "ALREADY_REFUNDED",
                CoreError::RefundQuantityExceedsSold { .. } => "REFUND_EXCEEDS_SOLD",
                CoreError::ActiveSessionExists(_) => "ACTIVE_SESSION_EXISTS",
                CoreError::SessionNotFound(_) => "SESSION_NOT_FOUND",
                CoreError::SessionClosed(_) => "SESSION_CLOSED",
                CoreError::PromotionExhausted(_) => "PROMOTION_EXHAUSTED",
                CoreError::PromotionNotEligible(_) => "PROMOTION_NOT_ELIGIBLE",
                CoreError::AmountPaidTooSmall { .. } => "AMOUNT_PAID_TOO_SMALL",
                CoreError::LedgerMismatch { .. } => "LEDGER_MISMATCH",
                CoreError::Validation(_) => "VALIDATION_ERROR",
            },
            EngineError::StorageContention { .. } => "STORAGE_CONTENTION",
            EngineError::Storage(e) => match e {
                DbError::NotFound { .. } => "NOT_FOUND",
                DbError::UniqueViolation { .. } => "CONFLICT",
                _ => "STORAGE_ERROR",
            },
        }
    }

    /// Whether the caller caused this error (4xx-equivalent) as opposed
    /// to the engine or its storage (5xx-equivalent).
    ///
    /// `LedgerMismatch` is classified server-side: the caller did nothing
    /// wrong, the store failed an integrity audit.
    pub fn is_client_error(&self) -> bool {
        match self {
            EngineError::Business(CoreError::LedgerMismatch { .. }) => false,
            EngineError::Business(_) => true,
            EngineError::StorageContention { .. } => false,
            EngineError::Storage(e) => {
                matches!(e, DbError::NotFound { .. } | DbError::UniqueViolation { .. })
            }
        }
    }

    /// Whether retrying the same call may succeed without any input
    /// change. Only transient storage contention qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_busy())
    }
}

/// Validation failures convert straight to the business variant, so
/// validator calls can use `?` inside engine code.
impl From<comptoir_core::ValidationError> for EngineError {
    fn from(err: comptoir_core::ValidationError) -> Self {
        EngineError::Business(CoreError::Validation(err))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        let err = EngineError::Business(CoreError::InsufficientStock {
            sku: "COLA-330".to_string(),
            available: 2,
            requested: 3,
        });
        assert_eq!(err.reason_code(), "INSUFFICIENT_STOCK");
        assert!(err.is_client_error());

        let err = EngineError::StorageContention { attempts: 5 };
        assert_eq!(err.reason_code(), "STORAGE_CONTENTION");
        assert!(!err.is_client_error());

        let err = EngineError::Business(CoreError::LedgerMismatch {
            product_id: "p1".to_string(),
            replayed: 4,
            counter: 5,
        });
        assert_eq!(err.reason_code(), "LEDGER_MISMATCH");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_retryable_classification() {
        let busy = EngineError::Storage(DbError::Busy("database is locked".to_string()));
        assert!(busy.is_retryable());

        let business = EngineError::Business(CoreError::AlreadyRefunded("s1".to_string()));
        assert!(!business.is_retryable());

        let contention = EngineError::StorageContention { attempts: 5 };
        assert!(!contention.is_retryable());
    }

    #[test]
    fn test_validation_converts_to_business() {
        let err: EngineError = comptoir_core::ValidationError::Required {
            field: "items".to_string(),
        }
        .into();
        assert_eq!(err.reason_code(), "VALIDATION_ERROR");
        assert!(err.is_client_error());
    }
}
