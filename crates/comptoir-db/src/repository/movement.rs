//! # Stock Movement Repository
//!
//! Append-only ledger of every inventory change.
//!
//! ## Ledger Replay
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Replaying a Product's Ledger From Zero                       │
//! │                                                                         │
//! │  rowid  kind        quantity   running sum                              │
//! │  ─────  ──────────  ────────   ───────────                              │
//! │  1      in          +20        20      (delivery)                       │
//! │  2      out          3         17      (sale)                           │
//! │  3      out          5         12      (sale)                           │
//! │  4      adjustment  -2         10      (breakage)                       │
//! │  5      in          +3         13      (refund restock)                 │
//! │                                                                         │
//! │  replay_sum == inventory.current_stock  →  ledger is consistent         │
//! │  anything else                          →  integrity error              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are inserted in the same transaction as the counter update they
//! record, so the two can never drift under crash or rollback.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use comptoir_core::{MovementKind, StockMovement};

/// Repository for the stock movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a movement row inside an open transaction.
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> DbResult<()> {
        debug!(
            product_id = %movement.product_id,
            kind = ?movement.kind,
            quantity = %movement.quantity,
            "Recording stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, kind, quantity, previous_stock, new_stock,
                reference, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reference)
        .bind(&movement.actor)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Lists movements for a product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, kind, quantity, previous_stock, new_stock,
                   reference, actor, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Replays the full ledger for a product from zero.
    ///
    /// Signed sum of every row: `in` adds, `out` subtracts, `adjustment`
    /// applies its signed quantity.
    pub async fn replay_sum(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(REPLAY_SUM)
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(sum)
    }

    /// Replays the ledger inside an open transaction, so the sum and the
    /// live counter come from the same snapshot.
    pub async fn replay_sum_tx(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(REPLAY_SUM)
            .bind(product_id)
            .fetch_one(conn)
            .await?;

        Ok(sum)
    }
}

const REPLAY_SUM: &str = r#"
    SELECT COALESCE(SUM(
        CASE kind
            WHEN 'in' THEN quantity
            WHEN 'out' THEN -quantity
            ELSE quantity
        END
    ), 0)
    FROM stock_movements
    WHERE product_id = ?1
"#;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use comptoir_core::Product;

    fn movement(product_id: &str, kind: MovementKind, qty: i64, prev: i64, new: i64) -> StockMovement {
        StockMovement {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            kind,
            quantity: qty,
            previous_stock: prev,
            new_stock: new,
            reference: None,
            actor: "system".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn seed_product(db: &Database, stock: i64) -> String {
        let now = Utc::now();
        let p = Product {
            id: uuid::Uuid::new_v4().to_string(),
            sku: "MOV-1".to_string(),
            name: "Movement test".to_string(),
            description: None,
            cost_price_cents: 50,
            selling_price_cents: 100,
            min_stock_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&p, stock).await.unwrap();
        p.id
    }

    #[tokio::test]
    async fn test_replay_sum_mixes_kinds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db, 0).await;

        let mut wtx = db.begin_write().await.unwrap();
        let repo = db.movements();
        repo.insert(wtx.conn(), &movement(&pid, MovementKind::In, 20, 0, 20))
            .await
            .unwrap();
        repo.insert(wtx.conn(), &movement(&pid, MovementKind::Out, 3, 20, 17))
            .await
            .unwrap();
        repo.insert(wtx.conn(), &movement(&pid, MovementKind::Out, 5, 17, 12))
            .await
            .unwrap();
        repo.insert(wtx.conn(), &movement(&pid, MovementKind::Adjustment, -2, 12, 10))
            .await
            .unwrap();
        repo.insert(wtx.conn(), &movement(&pid, MovementKind::In, 3, 10, 13))
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        assert_eq!(db.movements().replay_sum(&pid).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn test_replay_sum_empty_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db, 0).await;
        assert_eq!(db.movements().replay_sum(&pid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db, 0).await;

        let mut wtx = db.begin_write().await.unwrap();
        db.movements()
            .insert(wtx.conn(), &movement(&pid, MovementKind::In, 10, 0, 10))
            .await
            .unwrap();
        db.movements()
            .insert(wtx.conn(), &movement(&pid, MovementKind::Out, 4, 10, 6))
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let listed = db.movements().list_for_product(&pid, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, MovementKind::Out);
        assert_eq!(listed[0].new_stock, 6);
    }
}
