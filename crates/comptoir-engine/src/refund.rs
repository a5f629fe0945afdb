//! # Refund Processor
//!
//! Reverses a committed sale, wholly or line by line, without ever
//! mutating the original sale items.
//!
//! ## Refund Accounting
//! ```text
//! sale_items (immutable)          sale_refunds (append-only)
//! ┌──────────────────────┐        ┌────────────────────────────┐
//! │ item A   quantity 5  │◀───────│ item A  quantity 2  (call 1)│
//! │ item B   quantity 1  │        │ item A  quantity 3  (call 2)│
//! └──────────────────────┘        │ item B  quantity 1  (call 2)│
//!                                 └────────────────────────────┘
//!   refundable(A) = 5 − Σ refunds(A)
//! ```
//!
//! Every refunded unit goes back on the inventory counter and onto the
//! ledger as an `in` movement referencing `REFUND-<sale number>`. When
//! a refund covers the last open unit the sale flips to its terminal
//! `refunded` status, and (policy permitting) redeemed loyalty points,
//! earned points and promotion usage counters are all reversed in the
//! same transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use comptoir_core::validation::{validate_actor, validate_quantity, validate_reason};
use comptoir_core::{
    CoreError, MovementKind, SaleItem, SaleRefund, SaleStatus, StockMovement, ValidationError,
};
use comptoir_db::Database;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry::with_retry;

// =============================================================================
// Request / Result Types
// =============================================================================

/// One line of a partial refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineRequest {
    pub sale_item_id: String,
    pub quantity: i64,
}

/// A refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub reason: String,
    /// Who is issuing the refund; recorded on the ledger rows.
    pub actor: String,
    /// `None` refunds the un-refunded remainder of every item.
    pub lines: Option<Vec<RefundLineRequest>>,
}

/// One item's share of a committed refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundedLine {
    pub sale_item_id: String,
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
}

/// The outcome of a committed refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub sale_id: String,
    pub sale_number: String,
    /// Status after this refund: `partially_refunded` or `refunded`.
    pub status: SaleStatus,
    pub lines: Vec<RefundedLine>,
    pub restocked_units: i64,
    /// Redeemed points handed back to the customer (terminal refunds).
    pub loyalty_points_restored: i64,
    /// Earned points clawed back, clamped at zero (terminal refunds).
    pub loyalty_points_revoked: i64,
    /// Promotion uses released (terminal refunds).
    pub promotion_uses_released: i64,
}

// =============================================================================
// Refund Processor
// =============================================================================

/// Orchestrates refunds against the database.
#[derive(Debug, Clone)]
pub struct RefundProcessor {
    db: Database,
    config: EngineConfig,
}

impl RefundProcessor {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        RefundProcessor { db, config }
    }

    /// Refunds a sale.
    ///
    /// With `lines = None` the whole un-refunded remainder is restored;
    /// with an explicit list each line is bounded by what is still
    /// refundable for that item. Either way the operation is one
    /// transaction: stock, ledger, refund rows, status and any counter
    /// reversal commit together or not at all.
    pub async fn refund(&self, sale_id: &str, request: RefundRequest) -> EngineResult<RefundResult> {
        debug!(
            sale_id = %sale_id,
            full = request.lines.is_none(),
            "refund"
        );

        let reason = validate_reason(&request.reason)?;
        validate_actor(&request.actor)?;
        if let Some(lines) = &request.lines {
            if lines.is_empty() {
                return Err(ValidationError::Required {
                    field: "lines".to_string(),
                }
                .into());
            }
            for line in lines {
                validate_quantity(line.quantity)?;
            }
        }

        let request = &request;
        let reason = reason.as_str();
        let result =
            with_retry(&self.config.retry, || self.attempt(sale_id, request, reason)).await?;

        info!(
            sale_number = %result.sale_number,
            status = ?result.status,
            restocked_units = result.restocked_units,
            "Refund committed"
        );

        Ok(result)
    }

    async fn attempt(
        &self,
        sale_id: &str,
        request: &RefundRequest,
        reason: &str,
    ) -> EngineResult<RefundResult> {
        let sales = self.db.sales();
        let products = self.db.products();
        let movements = self.db.movements();
        let customers = self.db.customers();
        let promotions = self.db.promotions();

        let mut wtx = self.db.begin_write().await?;
        let now = Utc::now();

        let sale = sales
            .get_by_id_tx(wtx.conn(), sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.is_refunded() {
            return Err(CoreError::AlreadyRefunded(sale.id).into());
        }

        let items = sales.get_items_tx(wtx.conn(), &sale.id).await?;
        let refunded = sales.refunded_quantities_tx(wtx.conn(), &sale.id).await?;
        let refunded_of = |item_id: &str| -> i64 {
            refunded
                .iter()
                .find(|(id, _)| id == item_id)
                .map(|(_, quantity)| *quantity)
                .unwrap_or(0)
        };

        // Plan first, mutate second. Each entry is (item, quantity to
        // refund), with cumulative bounds already enforced.
        let plan: Vec<(&SaleItem, i64)> = match &request.lines {
            None => items
                .iter()
                .map(|item| (item, item.quantity - refunded_of(&item.id)))
                .filter(|(_, quantity)| *quantity > 0)
                .collect(),
            Some(lines) => {
                let mut plan: Vec<(&SaleItem, i64)> = Vec::with_capacity(lines.len());
                for line in lines {
                    let item = items
                        .iter()
                        .find(|item| item.id == line.sale_item_id)
                        .ok_or_else(|| CoreError::SaleItemNotFound(line.sale_item_id.clone()))?;

                    // Bound against prior refunds AND earlier lines of
                    // this same request naming the item twice.
                    let planned: i64 = plan
                        .iter()
                        .filter(|(planned_item, _)| planned_item.id == item.id)
                        .map(|(_, quantity)| *quantity)
                        .sum();
                    let refundable = item.quantity - refunded_of(&item.id) - planned;
                    if line.quantity > refundable {
                        return Err(CoreError::RefundQuantityExceedsSold {
                            item_id: item.id.clone(),
                            refundable,
                            requested: line.quantity,
                        }
                        .into());
                    }

                    plan.push((item, line.quantity));
                }
                plan
            }
        };

        if plan.is_empty() {
            // Every unit already refunded through partials.
            return Err(CoreError::AlreadyRefunded(sale.id).into());
        }

        let reference = format!("REFUND-{}", sale.sale_number);
        let mut lines_out: Vec<RefundedLine> = Vec::with_capacity(plan.len());
        let mut restocked_units = 0i64;

        for (item, quantity) in &plan {
            let new_stock = products
                .increment_stock(wtx.conn(), &item.product_id, *quantity)
                .await?;

            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                product_id: item.product_id.clone(),
                kind: MovementKind::In,
                quantity: *quantity,
                previous_stock: new_stock - *quantity,
                new_stock,
                reference: Some(reference.clone()),
                actor: request.actor.clone(),
                created_at: now,
            };
            movements.insert(wtx.conn(), &movement).await?;

            let refund_row = SaleRefund {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                sale_item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                quantity: *quantity,
                reason: reason.to_string(),
                created_at: now,
            };
            sales.insert_refund(wtx.conn(), &refund_row).await?;

            lines_out.push(RefundedLine {
                sale_item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                sku: item.sku_snapshot.clone(),
                quantity: *quantity,
            });
            restocked_units += *quantity;
        }

        let fully_covered = items.iter().all(|item| {
            let planned: i64 = plan
                .iter()
                .filter(|(planned_item, _)| planned_item.id == item.id)
                .map(|(_, quantity)| *quantity)
                .sum();
            refunded_of(&item.id) + planned >= item.quantity
        });
        let new_status = if fully_covered {
            SaleStatus::Refunded
        } else {
            SaleStatus::PartiallyRefunded
        };
        sales
            .update_status(wtx.conn(), &sale.id, new_status, now)
            .await?;

        // Counter reversal happens only when the refund terminates the
        // sale; a partially open sale's counters stay as they are.
        let mut loyalty_points_restored = 0i64;
        let mut loyalty_points_revoked = 0i64;
        let mut promotion_uses_released = 0i64;

        if new_status == SaleStatus::Refunded && self.config.reverse_counters_on_refund {
            if let Some(customer_id) = &sale.customer_id {
                if sale.loyalty_redeemed > 0 {
                    customers
                        .add_points(wtx.conn(), customer_id, sale.loyalty_redeemed)
                        .await?;
                    loyalty_points_restored = sale.loyalty_redeemed;
                }
                if sale.loyalty_earned > 0 {
                    customers
                        .deduct_points_clamped(wtx.conn(), customer_id, sale.loyalty_earned)
                        .await?;
                    loyalty_points_revoked = sale.loyalty_earned;
                }
            }

            let consumed = sales.get_applied_promotions_tx(wtx.conn(), &sale.id).await?;
            for promo in &consumed {
                promotions
                    .decrement_usage(wtx.conn(), &promo.promotion_id)
                    .await?;
            }
            promotion_uses_released = consumed.len() as i64;
        }

        wtx.commit().await?;

        Ok(RefundResult {
            sale_id: sale.id,
            sale_number: sale.sale_number,
            status: new_status,
            lines: lines_out,
            restocked_units,
            loyalty_points_restored,
            loyalty_points_revoked,
            promotion_uses_released,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
