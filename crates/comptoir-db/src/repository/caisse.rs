//! # Caisse Session Repository
//!
//! Database operations for cash register sessions.
//!
//! ## One Active Session Per Cashier
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ux_caisse_sessions_active_cashier                                      │
//! │      ON caisse_sessions(cashier_id) WHERE status = 'active'             │
//! │                                                                         │
//! │  Two concurrent opens for the same cashier:                             │
//! │    INSERT #1 → ok, session active                                       │
//! │    INSERT #2 → UNIQUE violation → DbError::UniqueViolation              │
//! │                                                                         │
//! │  Closing flips status to 'closed', which removes the row from the       │
//! │  partial index, so the cashier can open the next session.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use comptoir_core::CaisseSession;

/// Repository for caisse session operations.
#[derive(Debug, Clone)]
pub struct CaisseRepository {
    pool: SqlitePool,
}

/// Values written when a session closes.
#[derive(Debug, Clone)]
pub struct SessionClose {
    pub closing_cents: i64,
    pub expected_cents: i64,
    pub difference_cents: i64,
    pub notes: Option<String>,
    pub closed_at: DateTime<Utc>,
}

impl CaisseRepository {
    /// Creates a new CaisseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CaisseRepository { pool }
    }

    /// Inserts a new session.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the cashier already has an active
    ///   session (partial unique index)
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        session: &CaisseSession,
    ) -> DbResult<()> {
        debug!(cashier_id = %session.cashier_id, name = %session.name, "Opening caisse session");

        sqlx::query(
            r#"
            INSERT INTO caisse_sessions (
                id, cashier_id, name, opening_cents, current_cents, status,
                closing_cents, expected_cents, difference_cents, notes,
                opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&session.id)
        .bind(&session.cashier_id)
        .bind(&session.name)
        .bind(session.opening_cents)
        .bind(session.current_cents)
        .bind(session.status)
        .bind(session.closing_cents)
        .bind(session.expected_cents)
        .bind(session.difference_cents)
        .bind(&session.notes)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CaisseSession>> {
        let session = sqlx::query_as::<_, CaisseSession>(SELECT_SESSION)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Gets a session inside an open transaction.
    pub async fn get_by_id_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<CaisseSession>> {
        let session = sqlx::query_as::<_, CaisseSession>(SELECT_SESSION)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(session)
    }

    /// Gets a cashier's active session, if any.
    pub async fn get_active_for_cashier(&self, cashier_id: &str) -> DbResult<Option<CaisseSession>> {
        let session = sqlx::query_as::<_, CaisseSession>(
            r#"
            SELECT id, cashier_id, name, opening_cents, current_cents, status,
                   closing_cents, expected_cents, difference_cents, notes,
                   opened_at, closed_at
            FROM caisse_sessions
            WHERE cashier_id = ?1 AND status = 'active'
            "#,
        )
        .bind(cashier_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Adds cash to an active session's running drawer amount.
    ///
    /// ## Returns
    /// * `Ok(true)` - Drawer updated
    /// * `Ok(false)` - Session missing or already closed; nothing changed
    pub async fn try_add_cash(
        &self,
        conn: &mut SqliteConnection,
        session_id: &str,
        amount_cents: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE caisse_sessions
            SET current_cents = current_cents + ?2
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(session_id)
        .bind(amount_cents)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Closes an active session with its reconciliation figures.
    ///
    /// ## Returns
    /// * `Ok(true)` - Session closed
    /// * `Ok(false)` - Session missing or already closed; nothing changed
    pub async fn try_close(
        &self,
        conn: &mut SqliteConnection,
        session_id: &str,
        close: &SessionClose,
    ) -> DbResult<bool> {
        debug!(
            session_id = %session_id,
            closing_cents = %close.closing_cents,
            expected_cents = %close.expected_cents,
            "Closing caisse session"
        );

        let result = sqlx::query(
            r#"
            UPDATE caisse_sessions
            SET status = 'closed',
                closing_cents = ?2,
                expected_cents = ?3,
                difference_cents = ?4,
                notes = COALESCE(?5, notes),
                closed_at = ?6
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(session_id)
        .bind(close.closing_cents)
        .bind(close.expected_cents)
        .bind(close.difference_cents)
        .bind(&close.notes)
        .bind(close.closed_at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

const SELECT_SESSION: &str = r#"
    SELECT id, cashier_id, name, opening_cents, current_cents, status,
           closing_cents, expected_cents, difference_cents, notes,
           opened_at, closed_at
    FROM caisse_sessions
    WHERE id = ?1
"#;

// =============================================================================
// Unit Tests
// =============================================================================
