//! # Sale Processor
//!
//! Turns a validated cart into a committed sale inside one write
//! transaction.
//!
//! ## Processing Pipeline
//! ```text
//! ┌───────────────────┐  validate   ┌──────────────────────────────────┐
//! │ CreateSaleRequest │────────────▶│ one write transaction            │
//! │  (cart + tender)  │  (no I/O)   │   1. gate caisse session         │
//! └───────────────────┘             │   2. load customer, redeem pts   │
//!                                   │   3. decrement stock (guarded)   │
//!                                   │   4. evaluate promotions         │
//!                                   │   5. totals, tax, change         │
//!                                   │   6. consume promotion uses      │
//!                                   │   7. earn loyalty points         │
//!                                   │   8. allocate sale number        │
//!                                   │   9. sale + items + movements    │
//!                                   └────────────────┬─────────────────┘
//!                                        commit      │
//!                                                    ▼
//!                                              SaleReceipt
//! ```
//!
//! Any error before commit rolls the whole transaction back, so a cart
//! that fails on its third line leaves the first two lines' stock
//! untouched. Transient storage contention retries the entire attempt
//! with backoff.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use comptoir_core::promotion::total_discount_cents;
use comptoir_core::validation::{
    validate_actor, validate_cart_size, validate_cash_amount, validate_line_discount,
    validate_loyalty_redemption, validate_quantity,
};
use comptoir_core::{
    evaluate, loyalty_points_earned, loyalty_redemption_cents, select_stacked, ActivePromotion,
    AppliedPromotion, CartLine, CoreError, Money, MovementKind, PaymentMethod, Product, Sale,
    SaleItem, SalePromotion, SaleStatus, StockMovement, ValidationError,
};
use comptoir_db::Database;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry::with_retry;

// =============================================================================
// Request Types
// =============================================================================

/// One cart line as submitted by the caller.
///
/// The unit price is the price the cashier confirmed at the register;
/// the sale item freezes it as a snapshot together with the product's
/// sku and name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Per-line discount in cents. Bounded by the gross line total.
    #[serde(default)]
    pub discount_cents: i64,
}

/// A request to commit a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub cashier_id: String,
    /// Customer for loyalty earn/redeem. Required when points are
    /// redeemed.
    pub customer_id: Option<String>,
    /// Caisse session the sale is tagged to. Cash totals bump the
    /// session drawer.
    pub caisse_session_id: Option<String>,
    pub payment_method: PaymentMethod,
    /// Cash tendered. Required for cash sales, ignored otherwise.
    pub amount_paid_cents: Option<i64>,
    /// Loyalty points to redeem against the total (1 point = 100 cents).
    #[serde(default)]
    pub loyalty_points_redeemed: i64,
    /// Promotions to apply. `None` auto-applies every eligible
    /// promotion under the configured stacking policy; an explicit list
    /// must be fully eligible or the sale is rejected.
    pub promotion_ids: Option<Vec<String>>,
    pub notes: Option<String>,
    pub items: Vec<SaleLineRequest>,
}

// =============================================================================
// Receipt Types
// =============================================================================

/// One line on the receipt, frozen at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
}

/// One promotion as it applied to the sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPromotion {
    pub promotion_id: String,
    pub name: String,
    pub discount_cents: i64,
}

/// The committed sale, assembled for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub sale_id: String,
    pub sale_number: String,
    pub status: SaleStatus,
    pub items: Vec<ReceiptLine>,
    pub promotions: Vec<ReceiptPromotion>,
    pub subtotal_cents: i64,
    pub item_discount_cents: i64,
    pub promotion_discount_cents: i64,
    pub loyalty_discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub loyalty_earned: i64,
    pub loyalty_redeemed: i64,
    pub created_at: String,
}

// =============================================================================
// Sale Processor
// =============================================================================

/// A cart line after its stock decrement went through, with the loaded
/// product snapshot and the post-decrement counter.
struct PricedLine {
    product: Product,
    quantity: i64,
    unit_price_cents: i64,
    discount_cents: i64,
    new_stock: i64,
}

impl PricedLine {
    fn gross_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }

    fn line_total_cents(&self) -> i64 {
        self.gross_cents() - self.discount_cents
    }
}

/// Orchestrates sale creation against the database.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
    config: EngineConfig,
}

impl SaleProcessor {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        SaleProcessor { db, config }
    }

    /// Commits a sale.
    ///
    /// Validates the request without touching storage, then runs the
    /// transactional attempt under the retry policy. Business errors
    /// surface immediately; only transient contention is retried.
    pub async fn create_sale(&self, request: CreateSaleRequest) -> EngineResult<SaleReceipt> {
        debug!(
            cashier_id = %request.cashier_id,
            items = request.items.len(),
            payment_method = ?request.payment_method,
            "create_sale"
        );

        self.validate(&request)?;

        let request = &request;
        let receipt = with_retry(&self.config.retry, || self.attempt(request)).await?;

        info!(
            sale_number = %receipt.sale_number,
            total_cents = receipt.total_cents,
            items = receipt.items.len(),
            "Sale committed"
        );

        Ok(receipt)
    }

    /// Request validation. Runs before any I/O.
    fn validate(&self, request: &CreateSaleRequest) -> EngineResult<()> {
        validate_cart_size(request.items.len())?;
        validate_actor(&request.cashier_id)?;

        for line in &request.items {
            validate_quantity(line.quantity)?;
            validate_cash_amount("unit_price_cents", line.unit_price_cents)?;
            validate_line_discount(line.discount_cents, line.quantity * line.unit_price_cents)?;
        }

        validate_loyalty_redemption(request.loyalty_points_redeemed)?;
        if request.loyalty_points_redeemed > 0 && request.customer_id.is_none() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }

        if request.payment_method == PaymentMethod::Cash {
            match request.amount_paid_cents {
                Some(paid) => validate_cash_amount("amount_paid_cents", paid)?,
                None => {
                    return Err(ValidationError::Required {
                        field: "amount_paid_cents".to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// One transactional attempt. Every step runs on the write
    /// connection; the first error rolls everything back.
    async fn attempt(&self, request: &CreateSaleRequest) -> EngineResult<SaleReceipt> {
        let products = self.db.products();
        let sales = self.db.sales();
        let movements = self.db.movements();
        let promotions = self.db.promotions();
        let customers = self.db.customers();
        let caisse = self.db.caisse();

        let mut wtx = self.db.begin_write().await?;

        let now = Utc::now();
        let today = now.date_naive();

        // Session gate. Closed sessions take no sales at all, cash or not.
        let session = match &request.caisse_session_id {
            Some(session_id) => {
                let session = caisse
                    .get_by_id_tx(wtx.conn(), session_id)
                    .await?
                    .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
                if !session.is_active() {
                    return Err(CoreError::SessionClosed(session_id.clone()).into());
                }
                Some(session)
            }
            None => None,
        };

        // Customer and redemption. The conditional deduct is the
        // authoritative balance check; the loaded row only feeds the
        // error message.
        let customer = match &request.customer_id {
            Some(customer_id) => {
                let customer = customers
                    .get_by_id_tx(wtx.conn(), customer_id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(customer_id.clone()))?;

                if request.loyalty_points_redeemed > 0 {
                    let deducted = customers
                        .try_deduct_points(wtx.conn(), &customer.id, request.loyalty_points_redeemed)
                        .await?;
                    if !deducted {
                        return Err(CoreError::InsufficientLoyaltyPoints {
                            available: customer.loyalty_points,
                            requested: request.loyalty_points_redeemed,
                        }
                        .into());
                    }
                }

                Some(customer)
            }
            None => None,
        };

        // Stock. One conditional decrement per line; rows_affected = 0
        // means the counter cannot cover the quantity.
        let mut priced: Vec<PricedLine> = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = products
                .get_by_id_tx(wtx.conn(), &line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            let new_stock = match products
                .try_decrement_stock(wtx.conn(), &product.id, line.quantity)
                .await?
            {
                Some(new_stock) => new_stock,
                None => {
                    let available = products
                        .get_stock_tx(wtx.conn(), &product.id)
                        .await?
                        .unwrap_or(0);
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku,
                        available,
                        requested: line.quantity,
                    }
                    .into());
                }
            };

            priced.push(PricedLine {
                product,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                discount_cents: line.discount_cents,
                new_stock,
            });
        }

        let subtotal: i64 = priced.iter().map(|l| l.gross_cents()).sum();
        let item_discounts: i64 = priced.iter().map(|l| l.discount_cents).sum();

        // Promotions, evaluated against the candidate rows read in this
        // same transaction.
        let cart_lines: Vec<CartLine> = priced
            .iter()
            .map(|l| CartLine {
                product_id: l.product.id.clone(),
                quantity: l.quantity,
                unit_price_cents: l.unit_price_cents,
            })
            .collect();

        let candidates = promotions.list_candidates_tx(wtx.conn(), today).await?;
        let applied = self.apply_promotions(&cart_lines, candidates, request, today)?;
        let promotion_discounts = total_discount_cents(&applied);

        let loyalty_discount = loyalty_redemption_cents(request.loyalty_points_redeemed);

        let base = subtotal - item_discounts - promotion_discounts - loyalty_discount;
        if base < 0 {
            return Err(CoreError::NegativeTotal { total_cents: base }.into());
        }

        let tax = Money::from_cents(base).calculate_tax(self.config.tax_rate).cents();
        let total = base + tax;

        // Consume one use per applied promotion. The candidate read
        // already gated the cap, so a failed conditional update means
        // the counter moved underneath us.
        for promo in &applied {
            let consumed = promotions
                .try_increment_usage(wtx.conn(), &promo.promotion_id)
                .await?;
            if !consumed {
                return Err(CoreError::PromotionExhausted(promo.promotion_id.clone()).into());
            }
        }

        let (amount_paid, change) = match request.payment_method {
            PaymentMethod::Cash => {
                let paid = request.amount_paid_cents.unwrap_or(0);
                if paid < total {
                    return Err(CoreError::AmountPaidTooSmall {
                        paid_cents: paid,
                        total_cents: total,
                    }
                    .into());
                }
                (Some(paid), Some(paid - total))
            }
            _ => (None, None),
        };

        // Only cash lands in the drawer. The conditional update doubles
        // as a second active-status check.
        if let Some(session) = &session {
            if request.payment_method == PaymentMethod::Cash {
                let bumped = caisse.try_add_cash(wtx.conn(), &session.id, total).await?;
                if !bumped {
                    return Err(CoreError::SessionClosed(session.id.clone()).into());
                }
            }
        }

        let loyalty_earned = match &customer {
            Some(customer) => {
                let earned = loyalty_points_earned(total);
                if earned > 0 {
                    customers.add_points(wtx.conn(), &customer.id, earned).await?;
                }
                earned
            }
            None => 0,
        };

        let day = now.format("%Y%m%d").to_string();
        let seq = sales.next_sale_seq(wtx.conn(), &day).await?;
        let sale_number = format!("SALE-{}-{:04}", day, seq);

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            sale_number,
            customer_id: request.customer_id.clone(),
            cashier_id: request.cashier_id.clone(),
            caisse_session_id: request.caisse_session_id.clone(),
            status: SaleStatus::Completed,
            subtotal_cents: subtotal,
            item_discount_cents: item_discounts,
            promotion_discount_cents: promotion_discounts,
            loyalty_discount_cents: loyalty_discount,
            tax_cents: tax,
            total_cents: total,
            payment_method: request.payment_method,
            amount_paid_cents: amount_paid,
            change_cents: change,
            loyalty_earned,
            loyalty_redeemed: request.loyalty_points_redeemed,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        sales.insert_sale(wtx.conn(), &sale).await?;

        let mut items: Vec<SaleItem> = Vec::with_capacity(priced.len());
        for line in &priced {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product.id.clone(),
                sku_snapshot: line.product.sku.clone(),
                name_snapshot: line.product.name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                discount_cents: line.discount_cents,
                line_total_cents: line.line_total_cents(),
                created_at: now,
            };
            sales.insert_item(wtx.conn(), &item).await?;
            items.push(item);

            let movement = StockMovement {
                id: Uuid::new_v4().to_string(),
                product_id: line.product.id.clone(),
                kind: MovementKind::Out,
                quantity: line.quantity,
                previous_stock: line.new_stock + line.quantity,
                new_stock: line.new_stock,
                reference: Some(sale.sale_number.clone()),
                actor: request.cashier_id.clone(),
                created_at: now,
            };
            movements.insert(wtx.conn(), &movement).await?;
        }

        for promo in &applied {
            let row = SalePromotion {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                promotion_id: promo.promotion_id.clone(),
                name_snapshot: promo.name.clone(),
                discount_cents: promo.discount_cents,
                created_at: now,
            };
            sales.insert_applied_promotion(wtx.conn(), &row).await?;
        }

        wtx.commit().await?;

        Ok(build_receipt(sale, items, applied))
    }

    /// Resolves which promotions apply.
    ///
    /// Without an explicit list, every eligible promotion is evaluated
    /// and the stacking policy picks the final set. With one, the
    /// caller's choice stands, but each requested promotion must come
    /// out of the evaluator with a discount or the sale is rejected.
    fn apply_promotions(
        &self,
        cart_lines: &[CartLine],
        candidates: Vec<ActivePromotion>,
        request: &CreateSaleRequest,
        today: chrono::NaiveDate,
    ) -> EngineResult<Vec<AppliedPromotion>> {
        match &request.promotion_ids {
            None => {
                let applied = evaluate(cart_lines, &candidates, today);
                Ok(select_stacked(self.config.stacking_policy, applied))
            }
            Some(ids) => {
                let chosen: Vec<ActivePromotion> = candidates
                    .into_iter()
                    .filter(|c| ids.iter().any(|id| id == &c.promotion.id))
                    .collect();
                let applied = evaluate(cart_lines, &chosen, today);
                for id in ids {
                    if !applied.iter().any(|a| &a.promotion_id == id) {
                        return Err(CoreError::PromotionNotEligible(id.clone()).into());
                    }
                }
                Ok(applied)
            }
        }
    }
}

fn build_receipt(sale: Sale, items: Vec<SaleItem>, applied: Vec<AppliedPromotion>) -> SaleReceipt {
    SaleReceipt {
        sale_id: sale.id,
        sale_number: sale.sale_number,
        status: sale.status,
        items: items
            .into_iter()
            .map(|item| ReceiptLine {
                product_id: item.product_id,
                sku: item.sku_snapshot,
                name: item.name_snapshot,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                discount_cents: item.discount_cents,
                line_total_cents: item.line_total_cents,
            })
            .collect(),
        promotions: applied
            .into_iter()
            .map(|promo| ReceiptPromotion {
                promotion_id: promo.promotion_id,
                name: promo.name,
                discount_cents: promo.discount_cents,
            })
            .collect(),
        subtotal_cents: sale.subtotal_cents,
        item_discount_cents: sale.item_discount_cents,
        promotion_discount_cents: sale.promotion_discount_cents,
        loyalty_discount_cents: sale.loyalty_discount_cents,
        tax_cents: sale.tax_cents,
        total_cents: sale.total_cents,
        payment_method: sale.payment_method,
        amount_paid_cents: sale.amount_paid_cents,
        change_cents: sale.change_cents,
        loyalty_earned: sale.loyalty_earned,
        loyalty_redeemed: sale.loyalty_redeemed,
        created_at: sale.created_at.to_rfc3339(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testutil::{
        card_request, cash_request, line, promo, seed_customer, seed_product, seed_promotion,
        test_engine,
    };
    use comptoir_core::PromotionKind;
    use comptoir_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_cash_sale_with_percentage_promotion() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "COLA-330", 1000, 10).await;
        seed_promotion(
            engine.db(),
            &promo("10% off everything", PromotionKind::Percentage, 1000),
            &[],
        )
        .await;

        let receipt = engine
            .sales()
            .create_sale(cash_request("cashier-1", vec![line(&product_id, 3, 1000)], 3000))
            .await
            .unwrap();

        assert_eq!(receipt.subtotal_cents, 3000);
        assert_eq!(receipt.promotion_discount_cents, 300);
        assert_eq!(receipt.total_cents, 2700);
        assert_eq!(receipt.change_cents, Some(300));
        assert_eq!(receipt.status, SaleStatus::Completed);
        assert!(receipt.sale_number.starts_with("SALE-"));
        assert_eq!(receipt.promotions.len(), 1);

        // Stock decremented by 3, witnessed by one out movement on top
        // of the seeded opening row.
        let inventory = engine
            .db()
            .products()
            .get_inventory(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.current_stock, 7);

        let movements = engine
            .db()
            .movements()
            .list_for_product(&product_id, 10)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].kind, MovementKind::Out);
        assert_eq!(movements[0].quantity, 3);
        assert_eq!(movements[0].previous_stock, 10);
        assert_eq!(movements[0].new_stock, 7);
        assert_eq!(movements[0].reference.as_deref(), Some(receipt.sale_number.as_str()));
        assert_eq!(
            engine.db().movements().replay_sum(&product_id).await.unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_available() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "SCARCE-1", 500, 2).await;

        let err = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 3, 500)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Business(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));

        // Nothing moved; only the opening row is on the ledger.
        let inventory = engine
            .db()
            .products()
            .get_inventory(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.current_stock, 2);
        assert_eq!(
            engine
                .db()
                .movements()
                .list_for_product(&product_id, 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_earlier_lines() {
        let engine = test_engine().await;
        let plenty = seed_product(engine.db(), "PLENTY-1", 300, 50).await;
        let scarce = seed_product(engine.db(), "SCARCE-2", 400, 1).await;

        let err = engine
            .sales()
            .create_sale(card_request(
                "cashier-1",
                vec![line(&plenty, 5, 300), line(&scarce, 2, 400)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::InsufficientStock { .. })
        ));

        // The first line's decrement must not survive the rollback.
        let inventory = engine.db().products().get_inventory(&plenty).await.unwrap().unwrap();
        assert_eq!(inventory.current_stock, 50);
        assert_eq!(
            engine
                .db()
                .movements()
                .list_for_product(&plenty, 10)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_inactive_product_rejected() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "GONE-1", 500, 10).await;
        sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?1")
            .bind(&product_id)
            .execute(engine.db().pool())
            .await
            .unwrap();

        let err = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 500)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_loyalty_redeem_and_earn() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "LOYAL-1", 2000, 10).await;
        let customer_id = seed_customer(engine.db(), "Amira", 50).await;

        let mut request = card_request("cashier-1", vec![line(&product_id, 1, 2000)]);
        request.customer_id = Some(customer_id.clone());
        request.loyalty_points_redeemed = 5;

        let receipt = engine.sales().create_sale(request).await.unwrap();

        // 2000 - 500 redeemed = 1500 total, earning 15 points.
        assert_eq!(receipt.loyalty_discount_cents, 500);
        assert_eq!(receipt.total_cents, 1500);
        assert_eq!(receipt.loyalty_redeemed, 5);
        assert_eq!(receipt.loyalty_earned, 15);

        let customer = engine
            .db()
            .customers()
            .get_by_id(&customer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.loyalty_points, 50 - 5 + 15);
    }

    #[tokio::test]
    async fn test_redeeming_beyond_balance_rejected() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "LOYAL-2", 2000, 10).await;
        let customer_id = seed_customer(engine.db(), "Bilal", 3).await;

        let mut request = card_request("cashier-1", vec![line(&product_id, 1, 2000)]);
        request.customer_id = Some(customer_id.clone());
        request.loyalty_points_redeemed = 10;

        let err = engine.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::InsufficientLoyaltyPoints {
                available: 3,
                requested: 10,
            })
        ));

        // Balance and stock both intact after rollback.
        let customer = engine
            .db()
            .customers()
            .get_by_id(&customer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.loyalty_points, 3);
        let inventory = engine
            .db()
            .products()
            .get_inventory(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.current_stock, 10);
    }

    #[tokio::test]
    async fn test_redeeming_without_customer_rejected_before_io() {
        let engine = test_engine().await;

        let mut request = card_request("cashier-1", vec![line("missing-product", 1, 500)]);
        request.loyalty_points_redeemed = 2;

        // Fails on validation, not on the missing product.
        let err = engine.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cash_requires_amount_paid() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "CASH-1", 500, 10).await;

        let mut request = cash_request("cashier-1", vec![line(&product_id, 1, 500)], 500);
        request.amount_paid_cents = None;

        let err = engine.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_underpayment_rejected() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "CASH-2", 1000, 10).await;

        let err = engine
            .sales()
            .create_sale(cash_request("cashier-1", vec![line(&product_id, 3, 1000)], 2000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::AmountPaidTooSmall {
                paid_cents: 2000,
                total_cents: 3000,
            })
        ));

        let inventory = engine
            .db()
            .products()
            .get_inventory(&product_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inventory.current_stock, 10);
    }

    #[tokio::test]
    async fn test_negative_total_rejected() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "CHEAP-1", 500, 10).await;
        seed_promotion(
            engine.db(),
            &promo("600 off", PromotionKind::Fixed, 600),
            &[],
        )
        .await;

        let err = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 500)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::NegativeTotal { total_cents: -100 })
        ));
    }

    #[tokio::test]
    async fn test_promotion_cap_stops_applying() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "CAP-1", 1000, 20).await;
        let mut capped = promo("one use only", PromotionKind::Percentage, 1000);
        capped.max_uses = Some(1);
        let promo_id = capped.id.clone();
        seed_promotion(engine.db(), &capped, &[]).await;

        // First eligible sale consumes the only use.
        let first = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 1000)]))
            .await
            .unwrap();
        assert_eq!(first.promotion_discount_cents, 100);

        // Auto-apply now skips the exhausted promotion.
        let second = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 1000)]))
            .await
            .unwrap();
        assert!(second.promotions.is_empty());
        assert_eq!(second.total_cents, 1000);

        // Asking for it by id is an error, not a silent skip.
        let mut explicit = card_request("cashier-1", vec![line(&product_id, 1, 1000)]);
        explicit.promotion_ids = Some(vec![promo_id.clone()]);
        let err = engine.sales().create_sale(explicit).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::PromotionNotEligible(id)) if id == promo_id
        ));
    }

    #[tokio::test]
    async fn test_explicit_promotion_below_threshold_rejected() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "MIN-1", 300, 10).await;
        let mut gated = promo("min 10.00 purchase", PromotionKind::Fixed, 100);
        gated.min_purchase_cents = Some(1000);
        let promo_id = gated.id.clone();
        seed_promotion(engine.db(), &gated, &[]).await;

        let mut request = card_request("cashier-1", vec![line(&product_id, 1, 300)]);
        request.promotion_ids = Some(vec![promo_id.clone()]);

        let err = engine.sales().create_sale(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Business(CoreError::PromotionNotEligible(id)) if id == promo_id
        ));
    }

    #[tokio::test]
    async fn test_sale_numbers_increment_within_day() {
        let engine = test_engine().await;
        let product_id = seed_product(engine.db(), "SEQ-1", 500, 10).await;

        let first = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 500)]))
            .await
            .unwrap();
        let second = engine
            .sales()
            .create_sale(card_request("cashier-1", vec![line(&product_id, 1, 500)]))
            .await
            .unwrap();

        assert!(first.sale_number.ends_with("-0001"));
        assert!(second.sale_number.ends_with("-0002"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("race.db")))
            .await
            .unwrap();
        let product_id = seed_product(&db, "RACE-1", 1000, 5).await;
        let engine = crate::Engine::new(db.clone(), EngineConfig::default());

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            let product_id = product_id.clone();
            handles.push(tokio::spawn(async move {
                let request =
                    card_request(&format!("cashier-{}", i), vec![line(&product_id, 1, 1000)]);
                engine.sales().create_sale(request).await
            }));
        }

        let mut committed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(EngineError::Business(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, 5);
        assert_eq!(rejected, 3);

        let inventory = db.products().get_inventory(&product_id).await.unwrap().unwrap();
        assert_eq!(inventory.current_stock, 0);

        // The winners' ledger rows replay to the drained counter.
        assert_eq!(db.movements().replay_sum(&product_id).await.unwrap(), 0);
    }
}
