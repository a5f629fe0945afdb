//! # Product Repository
//!
//! Database operations for products and their inventory counters.
//!
//! ## Conditional Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                How try_decrement_stock Stays Safe                       │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write (races between the two statements)          │
//! │     SELECT current_stock ...          -- sees 5                         │
//! │     UPDATE inventory SET current_stock = 5 - 3                          │
//! │                                                                         │
//! │  ✅ CORRECT: guard inside the UPDATE itself                            │
//! │     UPDATE inventory                                                    │
//! │     SET current_stock = current_stock - 3                               │
//! │     WHERE product_id = ? AND current_stock >= 3                         │
//! │                                                                         │
//! │  rows_affected == 0  →  not enough stock, nothing changed               │
//! │  rows_affected == 1  →  decrement applied atomically                    │
//! │                                                                         │
//! │  The CHECK (current_stock >= 0) in the schema backs this up.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use comptoir_core::{InventoryCounter, Product};

/// Products at or below their reorder threshold.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LowStockItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub min_stock_level: i64,
}

/// Repository for product and inventory operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, cost_price_cents, selling_price_cents,
                   min_stock_level, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, cost_price_cents, selling_price_cents,
                   min_stock_level, is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product inside an open transaction.
    ///
    /// Sale and refund flows read the product on the write connection so
    /// the snapshot they price against cannot be pulled out from under
    /// them mid-transaction.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, cost_price_cents, selling_price_cents,
                   min_stock_level, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(product)
    }

    /// Gets the inventory counter for a product.
    pub async fn get_inventory(&self, product_id: &str) -> DbResult<Option<InventoryCounter>> {
        let counter = sqlx::query_as::<_, InventoryCounter>(
            r#"
            SELECT product_id, current_stock, reserved_stock, updated_at
            FROM inventory
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    /// Reads the current stock level inside an open transaction.
    pub async fn get_stock_tx(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<Option<i64>> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM inventory WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(conn)
                .await?;

        Ok(stock)
    }

    /// Atomically decrements stock if enough is available.
    ///
    /// ## Returns
    /// * `Ok(Some(new_stock))` - Decrement applied
    /// * `Ok(None)` - Not enough stock (or no counter row); nothing changed
    pub async fn try_decrement_stock(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<Option<i64>> {
        debug!(product_id = %product_id, quantity = %quantity, "Decrementing stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET current_stock = current_stock - ?2, updated_at = ?3
            WHERE product_id = ?1 AND current_stock >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let new_stock = self
            .get_stock_tx(conn, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", product_id))?;

        Ok(Some(new_stock))
    }

    /// Increments stock (refund restock, positive adjustment).
    ///
    /// ## Returns
    /// The new stock level.
    pub async fn increment_stock(
        &self,
        conn: &mut SqliteConnection,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<i64> {
        debug!(product_id = %product_id, quantity = %quantity, "Incrementing stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET current_stock = current_stock + ?2, updated_at = ?3
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Inventory", product_id));
        }

        let new_stock = self
            .get_stock_tx(conn, product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory", product_id))?;

        Ok(new_stock)
    }

    /// Lists active products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT p.id AS product_id, p.sku, p.name,
                   i.current_stock, p.min_stock_level
            FROM products p
            INNER JOIN inventory i ON i.product_id = p.id
            WHERE p.is_active = 1 AND i.current_stock <= p.min_stock_level
            ORDER BY i.current_stock ASC, p.sku
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Inserts a product together with its inventory counter.
    ///
    /// All rows land in one transaction; a product without a counter
    /// would make every sale of it fail. A non-zero opening stock also
    /// writes the opening `in` movement, so the ledger replays to the
    /// counter from day one.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - SKU already exists
    pub async fn insert(&self, product: &Product, initial_stock: i64) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, cost_price_cents, selling_price_cents,
                min_stock_level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, current_stock, reserved_stock, updated_at)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(&product.id)
        .bind(initial_stock)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await?;

        if initial_stock > 0 {
            sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id, product_id, kind, quantity, previous_stock, new_stock,
                    reference, actor, created_at
                ) VALUES (?1, ?2, 'in', ?3, 0, ?3, 'INITIAL', 'system', ?4)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&product.id)
            .bind(initial_stock)
            .bind(product.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Counts active products (for diagnostics and seed checks).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn product(sku: &str, price_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Test {sku}"),
            description: None,
            cost_price_cents: price_cents / 2,
            selling_price_cents: price_cents,
            min_stock_level: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product("COKE-330", 250);
        db.products().insert(&p, 10).await.unwrap();

        let loaded = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "COKE-330");
        assert_eq!(loaded.selling_price_cents, 250);

        let counter = db.products().get_inventory(&p.id).await.unwrap().unwrap();
        assert_eq!(counter.current_stock, 10);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("DUP-1", 100), 1).await.unwrap();

        let err = db.products().insert(&product("DUP-1", 200), 1).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_try_decrement_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = product("SNK-1", 150);
        db.products().insert(&p, 5).await.unwrap();

        let mut wtx = db.begin_write().await.unwrap();
        let new_stock = db
            .products()
            .try_decrement_stock(wtx.conn(), &p.id, 3)
            .await
            .unwrap();
        assert_eq!(new_stock, Some(2));

        // 4 > 2 remaining: refused, counter untouched.
        let refused = db
            .products()
            .try_decrement_stock(wtx.conn(), &p.id, 4)
            .await
            .unwrap();
        assert_eq!(refused, None);
        assert_eq!(
            db.products().get_stock_tx(wtx.conn(), &p.id).await.unwrap(),
            Some(2)
        );
        wtx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_increment_stock_requires_counter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut wtx = db.begin_write().await.unwrap();
        let err = db
            .products()
            .increment_stock(wtx.conn(), "no-such-product", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let low = product("LOW-1", 100); // min_stock_level 5
        let ok = product("OK-1", 100);
        db.products().insert(&low, 3).await.unwrap();
        db.products().insert(&ok, 50).await.unwrap();

        let items = db.products().list_low_stock().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "LOW-1");
        assert_eq!(items[0].current_stock, 3);
    }
}
