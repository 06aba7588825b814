//! # Session Manager
//!
//! Lifecycle of cash sessions: opening, closing (normal and forced) and
//! the balance reads the register screen needs.
//!
//! ## Lifecycle
//! ```text
//!                open(actor, opening_balance)
//!                          │
//!                          ▼
//!                   ┌────────────┐   record / payments
//!                   │    OPEN    │◄──────────────────┐
//!                   └─────┬──────┘───────────────────┘
//!          close (owner)  │  force_close (supervisor, reason)
//!                         ▼
//!                   ┌────────────┐
//!                   │   CLOSED   │  snapshot frozen; voids only
//!                   └────────────┘
//! ```
//!
//! At most one open session per actor. The check runs inside the write
//! transaction and the partial unique index on `cash_sessions` backs it up
//! across processes.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditRecord, AuditTrail};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::TransactionLedger;
use clinic_core::rules::{calculated_balance, closing_difference, post_close_drift};
use clinic_core::validation::{
    validate_actor_id, validate_final_amount, validate_opening_balance, validate_optional_text,
    validate_reason,
};
use clinic_core::{
    Actor, AuditSubject, CashSession, Clock, CoreError, Money, SessionEvent, SessionFilter,
    SessionStatus, SessionSummary,
};
use clinic_db::{
    generate_session_id, Database, DbError, SessionRepository, TransactionRepository,
};

const OPEN_SESSION_CONSTRAINT: &str = "cash_sessions.actor_id";

/// How a session is being closed.
enum Closure {
    Normal { notes: Option<String> },
    Forced { reason: String },
}

/// Cash session lifecycle service.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl SessionManager {
    pub fn new(db: Database, clock: Arc<dyn Clock>, audit: AuditTrail) -> Self {
        SessionManager { db, clock, audit }
    }

    /// Opens a session for `actor` with the counted opening balance.
    ///
    /// ## Errors
    /// - `Validation` for a negative balance or oversized notes
    /// - `SessionAlreadyOpen` when the actor has an open session
    pub async fn open(
        &self,
        actor: &dyn Actor,
        opening_balance: Money,
        notes: Option<&str>,
    ) -> LedgerResult<CashSession> {
        validate_actor_id(actor.id())?;
        validate_opening_balance(opening_balance)?;
        let notes = validate_optional_text("notes", notes)?;

        let mut tx = self.db.begin_write().await?;

        if let Some(existing) = SessionRepository::find_open_for_actor(tx.conn(), actor.id()).await? {
            warn!(actor_id = %actor.id(), session_id = %existing.id, "Session already open");
            return Err(CoreError::SessionAlreadyOpen {
                actor_id: actor.id().to_string(),
                session_id: Some(existing.id),
            }
            .into());
        }

        let session = CashSession {
            id: generate_session_id(),
            actor_id: actor.id().to_string(),
            opening_balance,
            final_physical_amount: None,
            closing_balance: None,
            difference: None,
            status: SessionStatus::Open,
            opened_at: self.clock.now(),
            closed_at: None,
            closed_by_actor_id: None,
            notes,
            closing_notes: None,
            closure_reason: None,
        };

        SessionRepository::insert(tx.conn(), &session)
            .await
            .map_err(|err| already_open_or(err, actor.id()))?;

        self.audit
            .record_on(
                tx.conn(),
                AuditRecord::new(
                    AuditSubject::CashSession(session.id.clone()),
                    SessionEvent::Opened,
                    actor.id(),
                )
                .new_values(json!({
                    "status": session.status,
                    "opening_balance": session.opening_balance,
                    "opened_at": session.opened_at,
                    "notes": session.notes,
                }))
                .description(format!("Cash session opened with {}", opening_balance)),
            )
            .await?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            actor_id = %actor.id(),
            opening_balance = %session.opening_balance,
            "Cash session opened"
        );
        Ok(session)
    }

    /// Closes the actor's own session with the counted drawer amount.
    ///
    /// ## Errors
    /// - `SessionNotFound`
    /// - `InvalidSessionState` when already closed
    /// - `NotSessionOwner` when `actor` did not open it
    pub async fn close(
        &self,
        actor: &dyn Actor,
        session_id: &str,
        final_physical_amount: Money,
        notes: Option<&str>,
    ) -> LedgerResult<CashSession> {
        validate_final_amount(final_physical_amount)?;
        let notes = validate_optional_text("notes", notes)?;

        let mut tx = self.db.begin_write().await?;
        let session = load_session(tx.conn(), session_id).await?;

        if !session.is_open() {
            return Err(CoreError::invalid_state(&session.id, session.status, "close").into());
        }
        if session.actor_id != actor.id() {
            warn!(session_id = %session.id, actor_id = %actor.id(), "Close by non-owner rejected");
            return Err(CoreError::NotSessionOwner {
                session_id: session.id,
                actor_id: actor.id().to_string(),
            }
            .into());
        }

        let closed = self
            .close_on(tx.conn(), session, final_physical_amount, actor, Closure::Normal { notes })
            .await?;
        tx.commit().await?;

        info!(
            session_id = %closed.id,
            actor_id = %actor.id(),
            difference = ?closed.difference,
            "Cash session closed"
        );
        Ok(closed)
    }

    /// Closes any open session on a supervisor's authority.
    ///
    /// `closed_by_actor_id` becomes the authorizing actor and the reason is
    /// stored as the closure reason. Capability checks belong to the caller.
    pub async fn force_close(
        &self,
        session_id: &str,
        final_physical_amount: Money,
        authorizing_actor: &dyn Actor,
        reason: &str,
    ) -> LedgerResult<CashSession> {
        let reason = validate_reason(reason)?;
        validate_final_amount(final_physical_amount)?;

        let mut tx = self.db.begin_write().await?;
        let session = load_session(tx.conn(), session_id).await?;

        if !session.is_open() {
            return Err(CoreError::invalid_state(&session.id, session.status, "force close").into());
        }

        let owner = session.actor_id.clone();
        let closed = self
            .close_on(
                tx.conn(),
                session,
                final_physical_amount,
                authorizing_actor,
                Closure::Forced { reason },
            )
            .await?;
        tx.commit().await?;

        warn!(
            session_id = %closed.id,
            owner_id = %owner,
            authorized_by = %authorizing_actor.id(),
            difference = ?closed.difference,
            "Cash session force closed"
        );
        Ok(closed)
    }

    async fn close_on(
        &self,
        conn: &mut SqliteConnection,
        session: CashSession,
        final_physical_amount: Money,
        actor: &dyn Actor,
        closure: Closure,
    ) -> LedgerResult<CashSession> {
        let totals = TransactionLedger::aggregate_on(conn, &session.id, true).await?;
        let calculated = calculated_balance(session.opening_balance, &totals)?;
        let difference = closing_difference(final_physical_amount, calculated)?;
        let now = self.clock.now();

        // closed_by marks a forced closure.
        let (event, closing_notes, closure_reason, closed_by) = match closure {
            Closure::Normal { notes } => (SessionEvent::Closed, notes, None, None),
            Closure::Forced { reason } => (
                SessionEvent::ForceClosed,
                None,
                Some(reason),
                Some(actor.id().to_string()),
            ),
        };

        let closed = CashSession {
            final_physical_amount: Some(final_physical_amount),
            closing_balance: Some(calculated),
            difference: Some(difference),
            status: SessionStatus::Closed,
            closed_at: Some(now),
            closed_by_actor_id: closed_by,
            closing_notes,
            closure_reason,
            ..session
        };

        SessionRepository::close(conn, &closed).await?;

        let description = match &closed.closure_reason {
            Some(reason) => reason.clone(),
            None => format!("Cash session closed with difference {}", difference),
        };
        self.audit
            .record_on(
                conn,
                AuditRecord::new(
                    AuditSubject::CashSession(closed.id.clone()),
                    event,
                    actor.id(),
                )
                .old_values(json!({
                    "status": SessionStatus::Open,
                    "opening_balance": closed.opening_balance,
                }))
                .new_values(json!({
                    "status": closed.status,
                    "final_physical_amount": final_physical_amount,
                    "closing_balance": calculated,
                    "difference": difference,
                    "total_income": totals.income,
                    "total_expense": totals.expense,
                    "transaction_count": totals.count,
                    "closed_at": now,
                    "closed_by_actor_id": closed.closed_by_actor_id,
                    "session_owner_id": closed.actor_id,
                    "closure_reason": closed.closure_reason,
                    "closing_notes": closed.closing_notes,
                }))
                .description(description),
            )
            .await?;

        Ok(closed)
    }

    /// The actor's open session, if any.
    pub async fn get_active_session(&self, actor_id: &str) -> LedgerResult<Option<CashSession>> {
        let mut conn = self.db.acquire().await?;
        Ok(SessionRepository::find_open_for_actor(&mut conn, actor_id).await?)
    }

    /// Loads one session.
    pub async fn get(&self, session_id: &str) -> LedgerResult<CashSession> {
        let mut conn = self.db.acquire().await?;
        load_session(&mut conn, session_id).await
    }

    /// Opening balance plus active income minus active expense.
    ///
    /// Only defined while the session is open; closed sessions report
    /// through [`SessionManager::summary`].
    pub async fn get_current_balance(&self, session_id: &str) -> LedgerResult<Money> {
        let mut conn = self.db.acquire().await?;
        let session = load_session(&mut conn, session_id).await?;

        if !session.is_open() {
            return Err(CoreError::invalid_state(
                &session.id,
                session.status,
                "read the current balance",
            )
            .into());
        }

        let totals = TransactionLedger::aggregate_on(&mut conn, &session.id, true).await?;
        Ok(calculated_balance(session.opening_balance, &totals)?)
    }

    /// Sessions matching `filter`, most recently opened first.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> LedgerResult<Vec<CashSession>> {
        let mut conn = self.db.acquire().await?;
        Ok(SessionRepository::list(&mut conn, filter).await?)
    }

    /// Reconciliation view: active totals, the frozen closing snapshot and
    /// the drift voids introduced after closing.
    pub async fn summary(&self, session_id: &str) -> LedgerResult<SessionSummary> {
        let mut conn = self.db.acquire().await?;
        let session = load_session(&mut conn, session_id).await?;

        let totals = TransactionLedger::aggregate_on(&mut conn, &session.id, true).await?;
        let voided_count = TransactionRepository::voided_count(&mut conn, &session.id).await?;
        let by_payment_method =
            TransactionRepository::totals_by_payment_method(&mut conn, &session.id).await?;

        let current_balance = calculated_balance(session.opening_balance, &totals)?;
        let drift = session
            .closing_balance
            .map(|closing| post_close_drift(current_balance, closing))
            .transpose()?;

        Ok(SessionSummary {
            closing_balance: session.closing_balance,
            difference: session.difference,
            session,
            totals,
            voided_count,
            current_balance,
            post_close_drift: drift,
            by_payment_method,
        })
    }

    /// Sessions still open that were opened before `cutoff`.
    pub async fn stale_open_sessions(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<CashSession>> {
        let filter = SessionFilter {
            status: Some(SessionStatus::Open),
            opened_to: Some(cutoff),
            ..SessionFilter::default()
        };
        self.list_sessions(&filter).await
    }
}

async fn load_session(conn: &mut SqliteConnection, session_id: &str) -> LedgerResult<CashSession> {
    SessionRepository::get_by_id(conn, session_id)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
}

/// A unique violation on the open-session index means a concurrent open won.
fn already_open_or(err: DbError, actor_id: &str) -> LedgerError {
    if err.is_unique_violation_on(OPEN_SESSION_CONSTRAINT) {
        warn!(actor_id = %actor_id, "Concurrent open rejected by unique index");
        CoreError::SessionAlreadyOpen {
            actor_id: actor_id.to_string(),
            session_id: None,
        }
        .into()
    } else {
        err.into()
    }
}
