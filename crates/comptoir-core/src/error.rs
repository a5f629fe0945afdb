//! # Error Types
//!
//! Domain-specific error types for comptoir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comptoir-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  comptoir-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  comptoir-engine errors (separate crate)                               │
//! │  └── EngineError      - What the caller sees (reason codes)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, available vs requested, etc.)
//! 3. Errors are enum variants, never String
//! 4. Business-rule errors are permanent: retrying the same input cannot
//!    succeed, so the engine never retries them

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
///
/// These errors are surfaced to the caller with enough detail to act on
/// (e.g. available vs requested quantity). They are never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete a sale or a negative adjustment.
    ///
    /// ## When This Occurs
    /// - The cart requests more units than the inventory counter holds
    /// - A concurrent sale consumed the stock between quote and commit
    ///   (the conditional decrement catches this case too)
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line (qty: 5)
    ///      │
    ///      ▼
    /// Conditional decrement: current_stock >= 5?  → no, available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "COLA-330", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Customer's loyalty balance cannot cover the requested redemption.
    #[error("Insufficient loyalty points: available {available}, requested {requested}")]
    InsufficientLoyaltyPoints { available: i64, requested: i64 },

    /// Discounts push the sale total below zero.
    #[error("Sale total is negative: {total_cents} cents")]
    NegativeTotal { total_cents: i64 },

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// A refund line references an item that is not on the sale.
    #[error("Sale item not found: {0}")]
    SaleItemNotFound(String),

    /// The sale is already fully refunded; a second full refund is rejected.
    #[error("Sale {0} is already refunded")]
    AlreadyRefunded(String),

    /// A refund line asks for more units than remain refundable.
    ///
    /// Cumulative across partial refunds: refunding 2 then 2 of a
    /// 3-unit line fails on the second call.
    #[error("Refund quantity {requested} exceeds refundable {refundable} for item {item_id}")]
    RefundQuantityExceedsSold {
        item_id: String,
        refundable: i64,
        requested: i64,
    },

    /// The cashier already has an active caisse session.
    #[error("Cashier {0} already has an active session")]
    ActiveSessionExists(String),

    /// Caisse session cannot be found.
    #[error("Caisse session not found: {0}")]
    SessionNotFound(String),

    /// The caisse session is closed; no sales may be tagged to it and it
    /// cannot be closed again.
    #[error("Caisse session {0} is closed")]
    SessionClosed(String),

    /// The promotion's usage cap is reached.
    ///
    /// The conditional usage increment guards this: a promotion with
    /// max_uses = N fails here on the N+1th eligible sale.
    #[error("Promotion {0} has reached its usage cap")]
    PromotionExhausted(String),

    /// A requested promotion is not active, out of its window, out of
    /// scope for the cart, or below its minimum thresholds.
    #[error("Promotion {0} is not eligible for this cart")]
    PromotionNotEligible(String),

    /// Cash tendered does not cover the sale total.
    #[error("Amount paid {paid_cents} is less than total {total_cents}")]
    AmountPaidTooSmall { paid_cents: i64, total_cents: i64 },

    /// A stock movement ledger does not replay to the live counter.
    /// Should never occur; fatal, logged, operation aborted.
    #[error("Ledger mismatch for product {product_id}: replayed {replayed}, counter {counter}")]
    LedgerMismatch {
        product_id: String,
        replayed: i64,
        counter: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// They are raised before any I/O happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A per-line discount exceeds the line total.
    #[error("discount {discount_cents} exceeds line total {line_total_cents}")]
    DiscountExceedsLine {
        discount_cents: i64,
        line_total_cents: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "COLA-330".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COLA-330: available 3, requested 5"
        );

        let err = CoreError::InsufficientLoyaltyPoints {
            available: 10,
            requested: 25,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient loyalty points: available 10, requested 25"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "items".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
