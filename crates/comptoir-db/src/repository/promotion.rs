//! # Promotion Repository
//!
//! Database operations for promotions, their product scopes and usage
//! counts.
//!
//! ## Usage Cap Enforcement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Why the Increment Is Conditional                           │
//! │                                                                         │
//! │  max_uses = 100, current_uses = 99, two sales race:                     │
//! │                                                                         │
//! │  UPDATE promotions SET current_uses = current_uses + 1                  │
//! │  WHERE id = ? AND (max_uses IS NULL OR current_uses < max_uses)        │
//! │                                                                         │
//! │  Sale A: rows_affected == 1  → promotion consumed (100th use)           │
//! │  Sale B: rows_affected == 0  → cap reached, discount refused            │
//! │                                                                         │
//! │  The losing sale's whole transaction rolls back, so it commits          │
//! │  without the discount only if re-run and re-evaluated.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use comptoir_core::promotion::ActivePromotion;
use comptoir_core::Promotion;

/// Repository for promotion database operations.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    /// Creates a new PromotionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Gets a promotion by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            SELECT id, name, kind, value, min_quantity, min_purchase_cents,
                   max_uses, current_uses, starts_on, ends_on, is_active,
                   created_at, updated_at
            FROM promotions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promotion)
    }

    /// Loads the active promotions valid on `today`, with their scopes.
    ///
    /// Runs on the sale's write connection so the usage counts the
    /// evaluator gates on are the ones the conditional increment will
    /// see.
    pub async fn list_candidates_tx(
        &self,
        conn: &mut SqliteConnection,
        today: NaiveDate,
    ) -> DbResult<Vec<ActivePromotion>> {
        let promotions = sqlx::query_as::<_, Promotion>(
            r#"
            SELECT id, name, kind, value, min_quantity, min_purchase_cents,
                   max_uses, current_uses, starts_on, ends_on, is_active,
                   created_at, updated_at
            FROM promotions
            WHERE is_active = 1 AND starts_on <= ?1 AND ends_on >= ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(today)
        .fetch_all(&mut *conn)
        .await?;

        if promotions.is_empty() {
            return Ok(Vec::new());
        }

        let scope_rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT pp.promotion_id, pp.product_id
            FROM promotion_products pp
            INNER JOIN promotions p ON p.id = pp.promotion_id
            WHERE p.is_active = 1 AND p.starts_on <= ?1 AND p.ends_on >= ?1
            "#,
        )
        .bind(today)
        .fetch_all(conn)
        .await?;

        debug!(
            candidates = promotions.len(),
            scope_rows = scope_rows.len(),
            "Loaded promotion candidates"
        );

        let candidates = promotions
            .into_iter()
            .map(|promotion| {
                let product_ids = scope_rows
                    .iter()
                    .filter(|(promo_id, _)| promo_id == &promotion.id)
                    .map(|(_, product_id)| product_id.clone())
                    .collect();
                ActivePromotion {
                    promotion,
                    product_ids,
                }
            })
            .collect();

        Ok(candidates)
    }

    /// Atomically consumes one use of a promotion.
    ///
    /// ## Returns
    /// * `Ok(true)` - Use recorded
    /// * `Ok(false)` - Usage cap reached; nothing changed
    pub async fn try_increment_usage(
        &self,
        conn: &mut SqliteConnection,
        promotion_id: &str,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE promotions
            SET current_uses = current_uses + 1, updated_at = ?2
            WHERE id = ?1 AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(promotion_id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Hands back one use of a promotion (full refund reversal).
    ///
    /// Clamped at zero: reversing more than was recorded must not wrap
    /// the counter negative.
    pub async fn decrement_usage(
        &self,
        conn: &mut SqliteConnection,
        promotion_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE promotions
            SET current_uses = MAX(current_uses - 1, 0), updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(promotion_id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Inserts a promotion with its product scope.
    ///
    /// An empty `product_ids` slice makes the promotion store-wide.
    pub async fn insert(&self, promotion: &Promotion, product_ids: &[String]) -> DbResult<()> {
        debug!(name = %promotion.name, kind = ?promotion.kind, "Inserting promotion");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, name, kind, value, min_quantity, min_purchase_cents,
                max_uses, current_uses, starts_on, ends_on, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.name)
        .bind(promotion.kind)
        .bind(promotion.value)
        .bind(promotion.min_quantity)
        .bind(promotion.min_purchase_cents)
        .bind(promotion.max_uses)
        .bind(promotion.current_uses)
        .bind(promotion.starts_on)
        .bind(promotion.ends_on)
        .bind(promotion.is_active)
        .bind(promotion.created_at)
        .bind(promotion.updated_at)
        .execute(&mut *tx)
        .await?;

        for product_id in product_ids {
            sqlx::query(
                "INSERT INTO promotion_products (promotion_id, product_id) VALUES (?1, ?2)",
            )
            .bind(&promotion.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
