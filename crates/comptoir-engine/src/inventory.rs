//! # Stock Adjustment & Ledger Verification
//!
//! Manual stock corrections (spoilage, recount, delivery without a
//! purchase order) and the consistency check that proves the movement
//! ledger still explains the live counter.
//!
//! ## Adjustment Convention
//! The delta is signed end to end: `adjust_stock(id, -3, ...)` writes an
//! `adjustment` movement with `quantity = -3`, unlike sale and refund
//! movements whose quantities are positive magnitudes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use comptoir_core::validation::{validate_actor, validate_adjustment_delta, validate_reason};
use comptoir_core::{CoreError, MovementKind, StockMovement};
use comptoir_db::{Database, LowStockItem};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry::with_retry;

// =============================================================================
// Result Types
// =============================================================================

/// A committed manual stock correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResult {
    pub product_id: String,
    pub sku: String,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub delta: i64,
    pub reason: String,
}

// =============================================================================
// Stock Adjuster
// =============================================================================

/// Orchestrates manual inventory mutations and ledger checks.
#[derive(Debug, Clone)]
pub struct StockAdjuster {
    db: Database,
    config: EngineConfig,
}

impl StockAdjuster {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        StockAdjuster { db, config }
    }

    /// Applies a signed manual correction to a product's stock.
    ///
    /// Negative deltas go through the same conditional guard as sales,
    /// so a correction can never drive the counter below zero. The
    /// adjustment lands on the ledger with the reason as its reference.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
        actor: &str,
    ) -> EngineResult<AdjustmentResult> {
        debug!(product_id = %product_id, delta = delta, "adjust_stock");

        validate_adjustment_delta(delta)?;
        validate_actor(actor)?;
        let reason = validate_reason(reason)?;

        let reason = reason.as_str();
        let result = with_retry(&self.config.retry, || {
            self.attempt_adjust(product_id, delta, reason, actor)
        })
        .await?;

        info!(
            product_id = %result.product_id,
            delta = result.delta,
            new_stock = result.new_stock,
            "Stock adjusted"
        );

        Ok(result)
    }

    async fn attempt_adjust(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
        actor: &str,
    ) -> EngineResult<AdjustmentResult> {
        let products = self.db.products();
        let movements = self.db.movements();

        let mut wtx = self.db.begin_write().await?;
        let now = Utc::now();

        // No is_active gate: discontinued products still get written off.
        let product = products
            .get_by_id_tx(wtx.conn(), product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let new_stock = if delta > 0 {
            products.increment_stock(wtx.conn(), product_id, delta).await?
        } else {
            match products
                .try_decrement_stock(wtx.conn(), product_id, -delta)
                .await?
            {
                Some(new_stock) => new_stock,
                None => {
                    let available = products
                        .get_stock_tx(wtx.conn(), product_id)
                        .await?
                        .unwrap_or(0);
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku,
                        available,
                        requested: -delta,
                    }
                    .into());
                }
            }
        };

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            kind: MovementKind::Adjustment,
            quantity: delta,
            previous_stock: new_stock - delta,
            new_stock,
            reference: Some(reason.to_string()),
            actor: actor.to_string(),
            created_at: now,
        };
        movements.insert(wtx.conn(), &movement).await?;

        wtx.commit().await?;

        Ok(AdjustmentResult {
            product_id: product_id.to_string(),
            sku: product.sku,
            previous_stock: new_stock - delta,
            new_stock,
            delta,
            reason: reason.to_string(),
        })
    }

    /// Replays the full movement ledger for a product and compares it to
    /// the live counter.
    ///
    /// Both reads run inside one transaction so a concurrent sale cannot
    /// wedge itself between them. A mismatch should never occur; it is
    /// logged as an error and surfaced as `LedgerMismatch`, never
    /// retried.
    ///
    /// ## Returns
    /// The verified stock level.
    pub async fn verify_product_ledger(&self, product_id: &str) -> EngineResult<i64> {
        with_retry(&self.config.retry, || self.attempt_verify(product_id)).await
    }

    async fn attempt_verify(&self, product_id: &str) -> EngineResult<i64> {
        let products = self.db.products();
        let movements = self.db.movements();

        let mut wtx = self.db.begin_write().await?;

        let counter = products
            .get_stock_tx(wtx.conn(), product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let replayed = movements.replay_sum_tx(wtx.conn(), product_id).await?;

        // Read-only transaction; nothing to keep.
        wtx.rollback().await?;

        if replayed != counter {
            error!(
                product_id = %product_id,
                replayed = replayed,
                counter = counter,
                "Stock ledger does not replay to the live counter"
            );
            return Err(CoreError::LedgerMismatch {
                product_id: product_id.to_string(),
                replayed,
                counter,
            }
            .into());
        }

        Ok(counter)
    }

    /// Active products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> EngineResult<Vec<LowStockItem>> {
        let items = self.db.products().list_low_stock().await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testutil::{card_request, line, seed_product, test_engine};
    use comptoir_core::ValidationError;

    #[tokio::test]
    async fn test_positive_adjustment() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "ADJ-1", 500, 5).await;

        let result = engine
            .inventory()
            .adjust_stock(&product_id, 3, "delivery without PO", "manager-1")
            .await
            .unwrap();

        assert_eq!(result.previous_stock, 5);
        assert_eq!(result.new_stock, 8);
        assert_eq!(result.delta, 3);

        let movements = engine
            .db()
            .movements()
            .list_for_product(&product_id, 10)
            .await
            .unwrap();
        assert_eq!(movements[0].kind, MovementKind::Adjustment);
        assert_eq!(movements[0].quantity, 3);
        assert_eq!(movements[0].previous_stock, 5);
        assert_eq!(movements[0].new_stock, 8);
        assert_eq!(movements[0].reference.as_deref(), Some("delivery without PO"));
        assert_eq!(movements[0].actor, "manager-1");
    }

    #[tokio::test]
    async fn test_negative_adjustment_carries_signed_quantity() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "ADJ-2", 500, 8).await;

        let result = engine
            .inventory()
            .adjust_stock(&product_id, -2, "spoilage", "manager-1")
            .await
            .unwrap();
        assert_eq!(result.new_stock, 6);

        let movements = engine
            .db()
            .movements()
            .list_for_product(&product_id, 10)
            .await
            .unwrap();
        assert_eq!(movements[0].quantity, -2);
        assert_eq!(movements[0].previous_stock, 8);
        assert_eq!(movements[0].new_stock, 6);
    }

    #[tokio::test]
    async fn test_overdraw_refused() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "ADJ-3", 500, 2).await;

        let err = engine
            .inventory()
            .adjust_stock(&product_id, -5, "recount", "manager-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::InsufficientStock {
                available: 2,
                requested: 5,
                ..
            })
        ));

        let inventory = engine
            .db()
            .products()
            .get_inventory(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.current_stock, 2);
    }

    #[tokio::test]
    async fn test_zero_delta_rejected() {
        let engine = test_engine().await;
        let err = engine
            .inventory()
            .adjust_stock("whatever", 0, "noop", "manager-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_product_rejected() {
        let engine = test_engine().await;
        let err = engine
            .inventory()
            .adjust_stock("no-such-product", 5, "recount", "manager-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ledger_verifies_after_mixed_activity() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "ADJ-4", 1000, 10).await;

        engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 3, 1000)]))
            .await
            .unwrap();
        engine
            .inventory()
            .adjust_stock(&product_id, 5, "delivery", "manager-1")
            .await
            .unwrap();
        engine
            .inventory()
            .adjust_stock(&product_id, -1, "breakage", "manager-1")
            .await
            .unwrap();

        // 10 - 3 + 5 - 1
        let verified = engine
            .inventory()
            .verify_product_ledger(&product_id)
            .await
            .unwrap();
        assert_eq!(verified, 11);
    }

    #[tokio::test]
    async fn test_ledger_mismatch_surfaces() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "ADJ-5", 1000, 10).await;

        // Corrupt the counter behind the ledger's back.
        sqlx::query("UPDATE inventory SET current_stock = 99 WHERE product_id = ?1")
            .bind(&product_id)
            .execute(engine.db().pool())
            .await
            .unwrap();

        let err = engine
            .inventory()
            .verify_product_ledger(&product_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::LedgerMismatch {
                replayed: 10,
                counter: 99,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_low_stock_projection() {
        let engine = test_engine().await;
        // seed_product sets min_stock_level = 5.
        let low = seed_product(engine.db(), "LOW-1", 500, 3).await;
        let fine = seed_product(engine.db(), "FINE-1", 500, 10).await;

        let items = engine.inventory().list_low_stock().await.unwrap();
        assert!(items.iter().any(|i| i.product_id == low));
        assert!(!items.iter().any(|i| i.product_id == fine));
    }
}
