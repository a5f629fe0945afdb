//! # Customer Repository
//!
//! Database operations for customers and loyalty balances.
//!
//! Balance changes mirror the inventory rules: additions are plain
//! updates, deductions are conditional on the balance covering the
//! amount, and the refund reversal of earned points clamps at zero
//! instead of failing.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use comptoir_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, loyalty_points, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer inside an open transaction.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, loyalty_points, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(customer)
    }

    /// Adds loyalty points (earning, refund reversal of a redemption).
    pub async fn add_points(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<()> {
        debug!(customer_id = %customer_id, points = %points, "Adding loyalty points");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET loyalty_points = loyalty_points + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Atomically deducts points if the balance covers them.
    ///
    /// ## Returns
    /// * `Ok(true)` - Deduction applied
    /// * `Ok(false)` - Balance too low (or no such customer); nothing changed
    pub async fn try_deduct_points(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<bool> {
        debug!(customer_id = %customer_id, points = %points, "Deducting loyalty points");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET loyalty_points = loyalty_points - ?2, updated_at = ?3
            WHERE id = ?1 AND loyalty_points >= ?2
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deducts earned points on refund, clamping at zero.
    ///
    /// The customer may have spent the points in the meantime; a refund
    /// must still go through, so the balance floors at zero rather than
    /// failing the whole reversal.
    pub async fn deduct_points_clamped(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET loyalty_points = MAX(loyalty_points - ?2, 0), updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Inserts a customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, loyalty_points, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.loyalty_points)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn customer(points: i64) -> Customer {
        let now = Utc::now();
        Customer {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Amina".to_string(),
            loyalty_points: points,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_try_deduct_points() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(10);
        db.customers().insert(&c).await.unwrap();

        let mut wtx = db.begin_write().await.unwrap();
        assert!(db.customers().try_deduct_points(wtx.conn(), &c.id, 10).await.unwrap());
        // Balance is now 0; any further deduction is refused.
        assert!(!db.customers().try_deduct_points(wtx.conn(), &c.id, 1).await.unwrap());
        wtx.commit().await.unwrap();

        let loaded = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_deduct_clamped_floors_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(3);
        db.customers().insert(&c).await.unwrap();

        let mut wtx = db.begin_write().await.unwrap();
        db.customers()
            .deduct_points_clamped(wtx.conn(), &c.id, 10)
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        let loaded = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.loyalty_points, 0);
    }
}
