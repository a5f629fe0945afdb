//! # Domain Types
//!
//! Core domain types for the sale transaction and inventory engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  CaisseSession  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  sale_number    │   │  cashier_id     │       │
//! │  │  price cents    │   │  status         │   │  opening_cents  │       │
//! │  │  min stock      │   │  total_cents    │   │  status         │       │
//! │  └────────┬────────┘   └────────┬────────┘   └─────────────────┘       │
//! │           │                     │                                       │
//! │  ┌────────▼────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │InventoryCounter │   │    SaleItem     │   │    Promotion    │       │
//! │  │  current_stock  │   │  qty, price     │   │  kind, value    │       │
//! │  │  (never < 0)    │   │  (immutable)    │   │  usage cap      │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │  ┌────────▼────────┐                                                    │
//! │  │  StockMovement  │  append-only ledger: every inventory change       │
//! │  │  prev → new     │  chains back to zero                              │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, sale_number, etc.) - human-readable, potentially mutable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25%, stored as an integer so tax math stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// Identity is immutable; prices and min_stock_level are mutable by
/// catalog management, which lives outside this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Cost price in cents (for margin reporting).
    pub cost_price_cents: i64,

    /// Selling price in cents.
    pub selling_price_cents: i64,

    /// Reorder threshold: products at or below this stock level are
    /// flagged by the low-stock projection.
    pub min_stock_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Returns the cost price as a Money type.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }
}

// =============================================================================
// Inventory Counter
// =============================================================================

/// The live stock counter for one product.
///
/// ## Invariant
/// `current_stock >= 0` at all times. The counter is mutated only through
/// sale, refund and stock-adjustment operations, each of which uses a
/// conditional update so a concurrent sale cannot drive it negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryCounter {
    pub product_id: String,

    /// Units on hand. Never negative.
    pub current_stock: i64,

    /// Units reserved (reported, not consumed by any engine operation).
    pub reserved_stock: i64,

    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// The direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock received (refund restock, delivery).
    In,
    /// Stock sold.
    Out,
    /// Manual correction; quantity carries the signed delta.
    Adjustment,
}

/// One immutable row of the stock-movement ledger.
///
/// ## Invariants
/// - Rows are append-only: never updated, never deleted.
/// - `new_stock == previous_stock + signed_delta()`.
/// - Replaying every row for a product from zero in insertion order
///   reproduces the live `InventoryCounter.current_stock`.
///
/// ## Quantity Convention
/// ```text
/// kind = in          quantity is a positive magnitude  (+quantity)
/// kind = out         quantity is a positive magnitude  (-quantity)
/// kind = adjustment  quantity is the signed delta      (+quantity)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// What caused the movement: a sale number, `REFUND-<sale number>`,
    /// or an adjustment reason.
    pub reference: Option<String>,
    /// Who triggered it (cashier id, "system", ...).
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// The effective change this movement applies to the counter.
    pub fn signed_delta(&self) -> i64 {
        match self.kind {
            MovementKind::In => self.quantity,
            MovementKind::Out => -self.quantity,
            MovementKind::Adjustment => self.quantity,
        }
    }

    /// Checks the row's internal chain arithmetic.
    pub fn is_consistent(&self) -> bool {
        self.previous_stock + self.signed_delta() == self.new_stock
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// Transitions only move toward refunded states:
/// `completed → partially_refunded → refunded` (or straight to refunded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been paid and committed.
    Completed,
    /// Some line items have been refunded.
    PartiallyRefunded,
    /// Every line item has been refunded. Terminal.
    Refunded,
}

impl SaleStatus {
    /// String form as persisted ("completed", "partially_refunded", ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::PartiallyRefunded => "partially_refunded",
            SaleStatus::Refunded => "refunded",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid.
///
/// Only `Cash` contributes to a caisse session's expected cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    /// Split tender; recorded as-is, contributes nothing to expected cash.
    Mixed,
}

impl PaymentMethod {
    /// String form as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Mixed => "mixed",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created once by the sale processor; after that only `status` (and
/// `updated_at`) ever change, and only toward refunded states.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Human-readable unique number: `SALE-YYYYMMDD-NNNN`.
    pub sale_number: String,
    pub customer_id: Option<String>,
    pub cashier_id: String,
    /// Caisse session this sale is tagged to, if any. A back-reference,
    /// not ownership: a session's sales are found by query.
    pub caisse_session_id: Option<String>,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    /// Sum of per-line discounts.
    pub item_discount_cents: i64,
    /// Sum of applied promotion discounts.
    pub promotion_discount_cents: i64,
    /// Redeemed loyalty points expressed in cents.
    pub loyalty_discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// Cash tendered by the customer (cash sales only).
    pub amount_paid_cents: Option<i64>,
    /// Change returned (cash sales only).
    pub change_cents: Option<i64>,
    /// Loyalty points earned by this sale.
    pub loyalty_earned: i64,
    /// Loyalty points redeemed against this sale.
    pub loyalty_redeemed: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether the sale is in the terminal refunded state.
    #[inline]
    pub fn is_refunded(&self) -> bool {
        self.status == SaleStatus::Refunded
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern to freeze product data at time of sale, and
/// is immutable after creation: refunds append `SaleRefund` rows rather
/// than editing the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Quantity sold.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Per-line discount in cents.
    pub discount_cents: i64,
    /// unit_price × quantity − discount.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Sale Refund
// =============================================================================

/// One refunded quantity of one sale item. Append-only.
///
/// Summing rows per item bounds cumulative partial refunds without ever
/// mutating the original `SaleItem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleRefund {
    pub id: String,
    pub sale_id: String,
    pub sale_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// A promotion as applied to one sale, with name and discount frozen.
///
/// Written alongside the sale so receipts and refund reversal do not
/// depend on the promotion definition staying unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePromotion {
    pub id: String,
    pub sale_id: String,
    pub promotion_id: String,
    pub name_snapshot: String,
    pub discount_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Promotion
// =============================================================================

/// The discount mechanics of a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// `value` is basis points off the scoped subtotal (1000 = 10%).
    Percentage,
    /// `value` is a flat discount in cents, applied once.
    Fixed,
    /// Buy `min_quantity`, get `value` units free, priced at the
    /// cheapest scoped unit price.
    BuyXGetY,
}

/// A promotion definition.
///
/// `current_uses` is incremented atomically with the sale that consumes
/// the promotion, guarded by `max_uses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub kind: PromotionKind,
    /// Meaning depends on `kind`: bps, cents, or free units.
    pub value: i64,
    /// Minimum total scoped quantity; for BuyXGetY this is the X.
    pub min_quantity: Option<i64>,
    /// Minimum scoped subtotal in cents.
    pub min_purchase_cents: Option<i64>,
    /// Usage cap. None = unbounded.
    pub max_uses: Option<i64>,
    pub current_uses: i64,
    /// First calendar day the promotion is valid (inclusive).
    pub starts_on: NaiveDate,
    /// Last calendar day the promotion is valid (inclusive).
    pub ends_on: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Caisse Session
// =============================================================================

/// Caisse session lifecycle: `active → closed`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CaisseStatus {
    Active,
    Closed,
}

/// A cashier's cash-register period, from opening float to closing
/// reconciliation.
///
/// ## Invariant
/// A cashier has at most one `active` session at a time, enforced by a
/// partial unique index at the storage layer so concurrent opens cannot
/// both succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CaisseSession {
    pub id: String,
    pub cashier_id: String,
    pub name: String,
    /// Opening float in cents.
    pub opening_cents: i64,
    /// Running drawer amount: opening + cash sale totals so far.
    pub current_cents: i64,
    pub status: CaisseStatus,
    /// Counted amount at close.
    pub closing_cents: Option<i64>,
    /// Derived at close: opening + Σ cash sale totals.
    pub expected_cents: Option<i64>,
    /// closing − expected. Zero means the drawer reconciled exactly.
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl CaisseSession {
    /// Whether the session can still take sales.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == CaisseStatus::Active
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with a loyalty balance.
///
/// `loyalty_points` is a non-negative counter mutated by sales
/// (earn/redeem) and refund reversal, always through conditional updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub loyalty_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
    }

    #[test]
    fn test_movement_signed_delta() {
        let base = StockMovement {
            id: "m1".to_string(),
            product_id: "p1".to_string(),
            kind: MovementKind::Out,
            quantity: 3,
            previous_stock: 10,
            new_stock: 7,
            reference: Some("SALE-20260824-0001".to_string()),
            actor: "cashier-1".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(base.signed_delta(), -3);
        assert!(base.is_consistent());

        let restock = StockMovement {
            kind: MovementKind::In,
            previous_stock: 7,
            new_stock: 10,
            ..base.clone()
        };
        assert_eq!(restock.signed_delta(), 3);
        assert!(restock.is_consistent());

        let adjustment = StockMovement {
            kind: MovementKind::Adjustment,
            quantity: -2,
            previous_stock: 10,
            new_stock: 8,
            ..base
        };
        assert_eq!(adjustment.signed_delta(), -2);
        assert!(adjustment.is_consistent());
    }

    #[test]
    fn test_movement_inconsistency_detected() {
        let broken = StockMovement {
            id: "m1".to_string(),
            product_id: "p1".to_string(),
            kind: MovementKind::Out,
            quantity: 3,
            previous_stock: 10,
            new_stock: 8, // should be 7
            reference: None,
            actor: "cashier-1".to_string(),
            created_at: Utc::now(),
        };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_status_strings_match_storage() {
        assert_eq!(SaleStatus::PartiallyRefunded.as_str(), "partially_refunded");
        assert_eq!(PaymentMethod::Cash.as_str(), "cash");
    }
}
