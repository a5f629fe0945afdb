//! # Sale Repository
//!
//! Database operations for sales, sale items, applied promotions and
//! refund rows.
//!
//! ## Sale Number Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Per-Day Counter (sale_counters)                         │
//! │                                                                         │
//! │  INSERT INTO sale_counters (day, last_seq) VALUES ('20260824', 1)      │
//! │  ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1                │
//! │  RETURNING last_seq                                                    │
//! │                                                                         │
//! │  First sale of the day  → inserts row, returns 1                       │
//! │  Every later sale       → bumps the row, returns 2, 3, 4...            │
//! │                                                                         │
//! │  The UPSERT runs inside the sale's own transaction, so a rolled        │
//! │  back sale rolls its number back too and numbering stays gapless.      │
//! │                                                                         │
//! │  Result: SALE-20260824-0001, SALE-20260824-0002, ...                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use comptoir_core::{Sale, SaleItem, SalePromotion, SaleRefund, SaleStatus};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Sale numbers
    // =========================================================================

    /// Allocates the next sequence number for the given day (YYYYMMDD).
    ///
    /// Must run inside the sale's write transaction.
    pub async fn next_sale_seq(&self, conn: &mut SqliteConnection, day: &str) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sale_counters (day, last_seq) VALUES (?1, 1)
            ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(day)
        .fetch_one(conn)
        .await?;

        Ok(seq)
    }

    // =========================================================================
    // Inserts (all transactional)
    // =========================================================================

    /// Inserts a sale row.
    pub async fn insert_sale(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, customer_id, cashier_id, caisse_session_id, status,
                subtotal_cents, item_discount_cents, promotion_discount_cents,
                loyalty_discount_cents, tax_cents, total_cents,
                payment_method, amount_paid_cents, change_cents,
                loyalty_earned, loyalty_redeemed, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.customer_id)
        .bind(&sale.cashier_id)
        .bind(&sale.caisse_session_id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.item_discount_cents)
        .bind(sale.promotion_discount_cents)
        .bind(sale.loyalty_discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.amount_paid_cents)
        .bind(sale.change_cents)
        .bind(sale.loyalty_earned)
        .bind(sale.loyalty_redeemed)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts a sale line item.
    ///
    /// ## Snapshot Pattern
    /// Product details (sku, name, price) are copied onto the item so
    /// the sale history survives later catalog edits.
    pub async fn insert_item(&self, conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, sku_snapshot, name_snapshot,
                quantity, unit_price_cents, discount_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Records a promotion applied to a sale.
    pub async fn insert_applied_promotion(
        &self,
        conn: &mut SqliteConnection,
        applied: &SalePromotion,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_promotions (
                id, sale_id, promotion_id, name_snapshot, discount_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&applied.id)
        .bind(&applied.sale_id)
        .bind(&applied.promotion_id)
        .bind(&applied.name_snapshot)
        .bind(applied.discount_cents)
        .bind(applied.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Appends a refund row for one sale item.
    pub async fn insert_refund(
        &self,
        conn: &mut SqliteConnection,
        refund: &SaleRefund,
    ) -> DbResult<()> {
        debug!(
            sale_id = %refund.sale_id,
            sale_item_id = %refund.sale_item_id,
            quantity = %refund.quantity,
            "Recording refund"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_refunds (
                id, sale_id, sale_item_id, product_id, quantity, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.sale_id)
        .bind(&refund.sale_item_id)
        .bind(&refund.product_id)
        .bind(refund.quantity)
        .bind(&refund.reason)
        .bind(refund.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(SELECT_SALE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale inside an open transaction.
    ///
    /// The refund flow reads the sale on the write connection so the
    /// status it checks cannot change before its own update commits.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(SELECT_SALE)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(sale)
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(SELECT_ITEMS)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Gets all items for a sale inside an open transaction.
    pub async fn get_items_tx(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(SELECT_ITEMS)
            .bind(sale_id)
            .fetch_all(conn)
            .await?;

        Ok(items)
    }

    /// Gets the promotions applied to a sale.
    pub async fn get_applied_promotions(&self, sale_id: &str) -> DbResult<Vec<SalePromotion>> {
        let applied = sqlx::query_as::<_, SalePromotion>(SELECT_APPLIED)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(applied)
    }

    /// Gets the promotions applied to a sale inside an open transaction.
    pub async fn get_applied_promotions_tx(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SalePromotion>> {
        let applied = sqlx::query_as::<_, SalePromotion>(SELECT_APPLIED)
            .bind(sale_id)
            .fetch_all(conn)
            .await?;

        Ok(applied)
    }

    /// Gets the refund rows recorded against a sale.
    pub async fn get_refunds(&self, sale_id: &str) -> DbResult<Vec<SaleRefund>> {
        let refunds = sqlx::query_as::<_, SaleRefund>(
            r#"
            SELECT id, sale_id, sale_item_id, product_id, quantity, reason, created_at
            FROM sale_refunds
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    /// Sums already-refunded quantities per item for a sale.
    ///
    /// Returns `(sale_item_id, refunded_quantity)` pairs; items never
    /// refunded are absent.
    pub async fn refunded_quantities_tx(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT sale_item_id, SUM(quantity)
            FROM sale_refunds
            WHERE sale_id = ?1
            GROUP BY sale_item_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Lists the sales tagged to a caisse session, oldest first.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, sale_number, customer_id, cashier_id, caisse_session_id, status,
                   subtotal_cents, item_discount_cents, promotion_discount_cents,
                   loyalty_discount_cents, tax_cents, total_cents,
                   payment_method, amount_paid_cents, change_cents,
                   loyalty_earned, loyalty_redeemed, notes, created_at, updated_at
            FROM sales
            WHERE caisse_session_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Per-payment-method sale counts and totals for a session.
    ///
    /// Rows are `(payment_method, sale_count, total_cents)`; methods with
    /// no sales are absent.
    pub async fn method_totals_for_session(
        &self,
        session_id: &str,
    ) -> DbResult<Vec<(String, i64, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT payment_method, COUNT(*), COALESCE(SUM(total_cents), 0)
            FROM sales
            WHERE caisse_session_id = ?1
            GROUP BY payment_method
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sums cash sale totals for a session inside an open transaction.
    ///
    /// Used by session close so the expected-cash figure and the status
    /// flip see the same set of sales.
    pub async fn sum_cash_for_session_tx(
        &self,
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0)
            FROM sales
            WHERE caisse_session_id = ?1 AND payment_method = 'cash'
            "#,
        )
        .bind(session_id)
        .fetch_one(conn)
        .await?;

        Ok(sum)
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Moves a sale to a refunded status.
    ///
    /// Guarded: a sale already in the terminal `refunded` state is never
    /// touched again.
    pub async fn update_status(
        &self,
        conn: &mut SqliteConnection,
        sale_id: &str,
        status: SaleStatus,
        updated_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status != 'refunded'
            "#,
        )
        .bind(sale_id)
        .bind(status)
        .bind(updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale (not refunded)", sale_id));
        }

        Ok(())
    }
}

const SELECT_SALE: &str = r#"
    SELECT id, sale_number, customer_id, cashier_id, caisse_session_id, status,
           subtotal_cents, item_discount_cents, promotion_discount_cents,
           loyalty_discount_cents, tax_cents, total_cents,
           payment_method, amount_paid_cents, change_cents,
           loyalty_earned, loyalty_redeemed, notes, created_at, updated_at
    FROM sales
    WHERE id = ?1
"#;

const SELECT_ITEMS: &str = r#"
    SELECT id, sale_id, product_id, sku_snapshot, name_snapshot,
           quantity, unit_price_cents, discount_cents, line_total_cents, created_at
    FROM sale_items
    WHERE sale_id = ?1
    ORDER BY rowid
"#;

const SELECT_APPLIED: &str = r#"
    SELECT id, sale_id, promotion_id, name_snapshot, discount_cents, created_at
    FROM sale_promotions
    WHERE sale_id = ?1
    ORDER BY rowid
"#;

// =============================================================================
// Unit Tests
// =============================================================================
