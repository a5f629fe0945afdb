//! # comptoir-engine: Transaction Orchestration for Comptoir
//!
//! This crate turns business operations into single database
//! transactions. Every write path validates its input before touching
//! storage, runs inside one write transaction, and retries transparently
//! when SQLite reports transient contention.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                       Engine (Facade)                            │  │
//! │  │                                                                  │  │
//! │  │  Cheap to clone; hands out per-concern processors that share     │  │
//! │  │  the same Database handle and EngineConfig                       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │     ┌──────────────┬──────────┴──────┬──────────────────┐              │
//! │     ▼              ▼                 ▼                  ▼               │
//! │  ┌──────────┐  ┌───────────┐  ┌──────────────┐  ┌───────────────┐     │
//! │  │   Sale   │  │  Refund   │  │   Caisse     │  │     Stock     │     │
//! │  │Processor │  │ Processor │  │   Manager    │  │    Adjuster   │     │
//! │  │          │  │           │  │              │  │               │     │
//! │  │ cart →   │  │ plan then │  │ open/close   │  │ signed deltas │     │
//! │  │ receipt, │  │ execute,  │  │ reconcile    │  │ ledger replay │     │
//! │  │ one tx   │  │ restock   │  │ drawer cash  │  │ verification  │     │
//! │  └────┬─────┘  └─────┬─────┘  └──────┬───────┘  └───────┬───────┘     │
//! │       │              │               │                  │              │
//! │       └──────────────┴───────┬───────┴──────────────────┘              │
//! │                              ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   with_retry (retry.rs)                          │  │
//! │  │                                                                  │  │
//! │  │  Re-runs an attempt when the database reports SQLITE_BUSY.       │  │
//! │  │  Business errors pass through untouched on the first hit.        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │                    comptoir-db (single-writer SQLite)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`sale`] - Sale processing: pricing, promotions, loyalty, payment
//! - [`refund`] - Partial and full refunds with counter reversal
//! - [`caisse`] - Cash drawer session lifecycle and reconciliation
//! - [`inventory`] - Manual stock corrections and ledger verification
//! - [`config`] - Engine tuning knobs (tax, stacking, retry)
//! - [`retry`] - Backoff loop for transient storage contention
//! - [`error`] - Unified error type with stable reason codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comptoir_db::{Database, DbConfig};
//! use comptoir_engine::{CreateSaleRequest, Engine, EngineConfig};
//!
//! let db = Database::new(DbConfig::new("store.db")).await?;
//! let engine = Engine::new(db, EngineConfig::from_env());
//!
//! let receipt = engine.sales().create_sale(request).await?;
//! println!("{} total {}", receipt.sale_number, receipt.total_cents);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod caisse;
pub mod config;
pub mod error;
pub mod inventory;
pub mod refund;
pub mod retry;
pub mod sale;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use retry::RetryPolicy;

pub use caisse::{
    CaisseManager, CloseSessionRequest, CloseSessionResult, OpenSessionRequest, SessionSummary,
};
pub use inventory::{AdjustmentResult, StockAdjuster};
pub use refund::{RefundLineRequest, RefundProcessor, RefundRequest, RefundResult};
pub use sale::{CreateSaleRequest, SaleLineRequest, SaleProcessor, SaleReceipt};

use comptoir_db::Database;

// =============================================================================
// Engine Facade
// =============================================================================

/// Entry point bundling every processor over one database handle.
///
/// Cloning is cheap (the pool and config are shared), so callers can
/// keep one `Engine` per process and clone it into tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Engine { db, config }
    }

    /// Sale processing: carts in, receipts out.
    pub fn sales(&self) -> SaleProcessor {
        SaleProcessor::new(self.db.clone(), self.config.clone())
    }

    /// Refund processing against committed sales.
    pub fn refunds(&self) -> RefundProcessor {
        RefundProcessor::new(self.db.clone(), self.config.clone())
    }

    /// Caisse session lifecycle and drawer reconciliation.
    pub fn caisse(&self) -> CaisseManager {
        CaisseManager::new(self.db.clone(), self.config.clone())
    }

    /// Manual stock corrections and ledger audits.
    pub fn inventory(&self) -> StockAdjuster {
        StockAdjuster::new(self.db.clone(), self.config.clone())
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for the engine test modules.

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use comptoir_core::{Customer, PaymentMethod, Product, Promotion, PromotionKind};
    use comptoir_db::{Database, DbConfig};

    use crate::config::EngineConfig;
    use crate::sale::{CreateSaleRequest, SaleLineRequest};
    use crate::Engine;

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn test_engine() -> Engine {
        Engine::new(test_db().await, EngineConfig::default())
    }

    pub async fn engine_with(config: EngineConfig) -> Engine {
        Engine::new(test_db().await, config)
    }

    /// Inserts a product and returns its id. Reorder threshold is 5.
    pub async fn seed_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Test {sku}"),
            description: None,
            cost_price_cents: price_cents / 2,
            selling_price_cents: price_cents,
            min_stock_level: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product, stock).await.unwrap();
        product.id
    }

    pub async fn seed_customer(db: &Database, name: &str, points: i64) -> String {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            loyalty_points: points,
            created_at: now,
            updated_at: now,
        };
        db.customers().insert(&customer).await.unwrap();
        customer.id
    }

    /// Builds an unrestricted promotion valid around today. Callers
    /// tighten fields before seeding when a test needs a gate.
    pub fn promo(name: &str, kind: PromotionKind, value: i64) -> Promotion {
        let now = Utc::now();
        let today = now.date_naive();
        Promotion {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind,
            value,
            min_quantity: None,
            min_purchase_cents: None,
            max_uses: None,
            current_uses: 0,
            starts_on: today - Duration::days(30),
            ends_on: today + Duration::days(365),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Empty `product_ids` makes the promotion store-wide.
    pub async fn seed_promotion(db: &Database, promotion: &Promotion, product_ids: &[String]) {
        db.promotions().insert(promotion, product_ids).await.unwrap();
    }

    pub fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
        }
    }

    pub fn cash_request(
        cashier: &str,
        items: Vec<SaleLineRequest>,
        paid: i64,
    ) -> CreateSaleRequest {
        CreateSaleRequest {
            cashier_id: cashier.to_string(),
            customer_id: None,
            caisse_session_id: None,
            payment_method: PaymentMethod::Cash,
            amount_paid_cents: Some(paid),
            loyalty_points_redeemed: 0,
            promotion_ids: None,
            notes: None,
            items,
        }
    }

    pub fn card_request(cashier: &str, items: Vec<SaleLineRequest>) -> CreateSaleRequest {
        CreateSaleRequest {
            cashier_id: cashier.to_string(),
            customer_id: None,
            caisse_session_id: None,
            payment_method: PaymentMethod::Card,
            amount_paid_cents: None,
            loyalty_points_redeemed: 0,
            promotion_ids: None,
            notes: None,
            items,
        }
    }
}
