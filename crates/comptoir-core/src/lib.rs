//! # comptoir-core: Pure Business Logic for the Comptoir Engine
//!
//! This crate is the **heart** of the Comptoir sale and inventory engine.
//! It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Comptoir Engine Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  comptoir-engine (Orchestration)                │   │
//! │  │   SaleProcessor ── RefundProcessor ── CaisseManager ── Stock   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ comptoir-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ promotion │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ evaluate  │  │   rules   │  │   │
//! │  │   │   Sale    │  │  TaxCalc  │  │  stacking │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  comptoir-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Promotion, CaisseSession, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`promotion`] - Pure promotion evaluation and stacking
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use comptoir_core::money::Money;
//! use comptoir_core::types::TaxRate;
//!
//! // Create money from cents (never from floats!)
//! let price = Money::from_cents(1099); // 10.99
//!
//! // Calculate tax, rounding half-up at the cent
//! let tax_rate = TaxRate::from_bps(825); // 8.25%
//! let tax = price.calculate_tax(tax_rate);
//!
//! // Tax on 10.99 at 8.25% = 0.91
//! assert_eq!(tax.cents(), 91);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod promotion;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use comptoir_core::Money` instead of
// `use comptoir_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use promotion::{
    ActivePromotion, AppliedPromotion, CartLine, StackingPolicy, evaluate, select_stacked,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single sale
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable transaction sizes.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a sale
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// How many cents one loyalty point is worth.
///
/// Earning and redemption both use this rate: a sale earns
/// `floor(total / 100)` points, and redeeming a point knocks one unit
/// of this value off the total.
pub const LOYALTY_CENTS_PER_POINT: i64 = 100;

/// Points earned by a sale of the given total.
#[inline]
pub const fn loyalty_points_earned(total_cents: i64) -> i64 {
    if total_cents <= 0 {
        0
    } else {
        total_cents / LOYALTY_CENTS_PER_POINT
    }
}

/// Cent value of a loyalty redemption.
#[inline]
pub const fn loyalty_redemption_cents(points: i64) -> i64 {
    points * LOYALTY_CENTS_PER_POINT
}
