//! # Validation Module
//!
//! Input validation for engine requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine Request (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints                                                │
//! │  ├── CHECK (current_stock >= 0)                                        │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use comptoir_core::validation::{validate_quantity, validate_line_discount};
//!
//! // Validate quantity before building a sale line
//! validate_quantity(5).unwrap();
//!
//! // Per-line discount may not exceed the gross line total
//! validate_line_discount(200, 1500).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## Example
/// ```rust
/// use comptoir_core::validation::validate_quantity;
///
/// assert!(validate_quantity(5).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a per-line discount against the gross line total.
///
/// ## Rules
/// - Must be non-negative
/// - Must not exceed unit price × quantity
pub fn validate_line_discount(discount_cents: i64, line_total_cents: i64) -> ValidationResult<()> {
    if discount_cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }

    if discount_cents > line_total_cents {
        return Err(ValidationError::DiscountExceedsLine {
            discount_cents,
            line_total_cents,
        });
    }

    Ok(())
}

/// Validates a cash amount in cents (opening float, closing count,
/// amount tendered).
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (empty drawer, exact change)
pub fn validate_cash_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a loyalty redemption request in points.
///
/// ## Rules
/// - Must be non-negative (zero means no redemption)
pub fn validate_loyalty_redemption(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "loyalty points".to_string(),
        });
    }

    Ok(())
}

/// Validates a manual stock adjustment delta.
///
/// ## Rules
/// - Must be non-zero; a zero adjustment is meaningless and would
///   write a no-op ledger row
pub fn validate_adjustment_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "delta".to_string(),
            reason: "adjustment must be non-zero".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
/// - Most tax rates are 0-2500 (0% to 25%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of lines in a sale request).
///
/// ## Rules
/// - Must have at least one line
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an actor identifier (cashier id, "system", ...).
///
/// ## Rules
/// - Must not be empty
/// - Maximum 100 characters
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    let actor = actor.trim();

    if actor.is_empty() {
        return Err(ValidationError::Required {
            field: "actor".to_string(),
        });
    }

    if actor.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "actor".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a refund or adjustment reason.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 500 characters
///
/// ## Returns
/// The trimmed reason string.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(reason.to_string())
}

/// Validates a caisse session name.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 100 characters
pub fn validate_session_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
