//! # Caisse Session Manager
//!
//! A cashier's drawer lifecycle, from opening float to closing count.
//!
//! ## Session Lifecycle
//! ```text
//!                open_session              close_session
//!   none ────────────────────▶ active ────────────────────▶ closed
//!          (one per cashier,             expected = opening
//!           index-enforced)                + Σ cash sales
//!                                        difference = counted
//!                                          − expected
//! ```
//!
//! Cash sales tagged to an active session bump its running drawer
//! amount as they commit; close reconciles the counted drawer against
//! the recomputed expectation inside one transaction, so a sale cannot
//! slip between the sum and the status flip.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use comptoir_core::validation::{validate_actor, validate_cash_amount, validate_session_name};
use comptoir_core::{CaisseSession, CaisseStatus, CoreError};
use comptoir_db::{Database, SessionClose};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry::with_retry;

// =============================================================================
// Request / Result Types
// =============================================================================

/// A request to open a caisse session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub cashier_id: String,
    /// Display name, e.g. "Morning shift".
    pub name: String,
    /// Counted opening float in cents.
    pub opening_cents: i64,
    pub notes: Option<String>,
}

/// A request to close a caisse session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    /// Counted drawer amount in cents.
    pub closing_cents: i64,
    pub notes: Option<String>,
}

/// Per-method sale counts and the cash reconciliation for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub cashier_id: String,
    pub status: CaisseStatus,
    pub opening_cents: i64,
    /// opening + Σ cash sale totals. Persisted at close; computed live
    /// for active sessions.
    pub expected_cash_cents: i64,
    /// Counted amount, once closed.
    pub actual_cash_cents: Option<i64>,
    /// actual − expected, once closed. Zero means exact.
    pub difference_cents: Option<i64>,
    pub total_sales: i64,
    pub cash_sales: i64,
    pub card_sales: i64,
    pub mobile_sales: i64,
    pub mixed_sales: i64,
    /// Σ total_cents of the cash sales, the amount the drawer grew by.
    pub cash_total_cents: i64,
}

/// The closed session together with its reconciliation summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResult {
    pub session: CaisseSession,
    pub summary: SessionSummary,
}

// =============================================================================
// Caisse Manager
// =============================================================================

/// Orchestrates caisse session lifecycle and reconciliation.
#[derive(Debug, Clone)]
pub struct CaisseManager {
    db: Database,
    config: EngineConfig,
}

impl CaisseManager {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        CaisseManager { db, config }
    }

    /// Opens a session for a cashier.
    ///
    /// The partial unique index on active sessions is the authority: two
    /// concurrent opens for one cashier cannot both insert, and the
    /// loser surfaces as `ActiveSessionExists`.
    pub async fn open_session(&self, request: OpenSessionRequest) -> EngineResult<CaisseSession> {
        debug!(cashier_id = %request.cashier_id, "open_session");

        validate_actor(&request.cashier_id)?;
        validate_session_name(&request.name)?;
        validate_cash_amount("opening_cents", request.opening_cents)?;

        let request = &request;
        let session = with_retry(&self.config.retry, || self.attempt_open(request)).await?;

        info!(
            session_id = %session.id,
            cashier_id = %session.cashier_id,
            opening_cents = session.opening_cents,
            "Caisse session opened"
        );

        Ok(session)
    }

    async fn attempt_open(&self, request: &OpenSessionRequest) -> EngineResult<CaisseSession> {
        let caisse = self.db.caisse();
        let mut wtx = self.db.begin_write().await?;

        let now = Utc::now();
        let session = CaisseSession {
            id: Uuid::new_v4().to_string(),
            cashier_id: request.cashier_id.clone(),
            name: request.name.clone(),
            opening_cents: request.opening_cents,
            current_cents: request.opening_cents,
            status: CaisseStatus::Active,
            closing_cents: None,
            expected_cents: None,
            difference_cents: None,
            notes: request.notes.clone(),
            opened_at: now,
            closed_at: None,
        };

        if let Err(e) = caisse.insert(wtx.conn(), &session).await {
            if e.is_unique_violation() {
                return Err(CoreError::ActiveSessionExists(request.cashier_id.clone()).into());
            }
            return Err(e.into());
        }

        wtx.commit().await?;
        Ok(session)
    }

    /// Closes a session and reconciles the drawer.
    ///
    /// Expected cash is recomputed from the tagged sales inside the
    /// closing transaction, then the conditional status flip persists
    /// expected, counted and difference in one step. Closing twice is
    /// `SessionClosed`.
    pub async fn close_session(
        &self,
        session_id: &str,
        request: CloseSessionRequest,
    ) -> EngineResult<CloseSessionResult> {
        debug!(session_id = %session_id, "close_session");

        validate_cash_amount("closing_cents", request.closing_cents)?;

        let request = &request;
        let session = with_retry(&self.config.retry, || self.attempt_close(session_id, request))
            .await?;

        let summary = self.build_summary(&session).await?;

        info!(
            session_id = %session.id,
            expected_cents = ?session.expected_cents,
            difference_cents = ?session.difference_cents,
            "Caisse session closed"
        );

        Ok(CloseSessionResult { session, summary })
    }

    async fn attempt_close(
        &self,
        session_id: &str,
        request: &CloseSessionRequest,
    ) -> EngineResult<CaisseSession> {
        let caisse = self.db.caisse();
        let sales = self.db.sales();

        let mut wtx = self.db.begin_write().await?;
        let now = Utc::now();

        let session = caisse
            .get_by_id_tx(wtx.conn(), session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;
        if !session.is_active() {
            return Err(CoreError::SessionClosed(session_id.to_string()).into());
        }

        let cash_total = sales.sum_cash_for_session_tx(wtx.conn(), session_id).await?;
        let expected = session.opening_cents + cash_total;
        let close = SessionClose {
            closing_cents: request.closing_cents,
            expected_cents: expected,
            difference_cents: request.closing_cents - expected,
            notes: request.notes.clone(),
            closed_at: now,
        };

        let closed = caisse.try_close(wtx.conn(), session_id, &close).await?;
        if !closed {
            return Err(CoreError::SessionClosed(session_id.to_string()).into());
        }

        let session = caisse
            .get_by_id_tx(wtx.conn(), session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

        wtx.commit().await?;
        Ok(session)
    }

    /// The cashier's active session, if any.
    pub async fn active_session(&self, cashier_id: &str) -> EngineResult<Option<CaisseSession>> {
        let session = self.db.caisse().get_active_for_cashier(cashier_id).await?;
        Ok(session)
    }

    /// Read-only reconciliation projection for a session.
    pub async fn session_summary(&self, session_id: &str) -> EngineResult<SessionSummary> {
        let session = self
            .db
            .caisse()
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;
        self.build_summary(&session).await
    }

    async fn build_summary(&self, session: &CaisseSession) -> EngineResult<SessionSummary> {
        let rows = self.db.sales().method_totals_for_session(&session.id).await?;

        let mut summary = SessionSummary {
            session_id: session.id.clone(),
            cashier_id: session.cashier_id.clone(),
            status: session.status,
            opening_cents: session.opening_cents,
            expected_cash_cents: 0,
            actual_cash_cents: session.closing_cents,
            difference_cents: session.difference_cents,
            total_sales: 0,
            cash_sales: 0,
            card_sales: 0,
            mobile_sales: 0,
            mixed_sales: 0,
            cash_total_cents: 0,
        };

        for (method, count, total_cents) in rows {
            summary.total_sales += count;
            match method.as_str() {
                "cash" => {
                    summary.cash_sales = count;
                    summary.cash_total_cents = total_cents;
                }
                "card" => summary.card_sales = count,
                "mobile" => summary.mobile_sales = count,
                "mixed" => summary.mixed_sales = count,
                _ => {}
            }
        }

        summary.expected_cash_cents = session
            .expected_cents
            .unwrap_or(session.opening_cents + summary.cash_total_cents);

        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
