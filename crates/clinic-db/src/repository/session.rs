//! # Cash Session Repository
//!
//! Database operations for cash sessions.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. OPEN                                                               │
//! │     └── insert() → CashSession { status: Open }                        │
//! │         (partial unique index: one open row per actor_id)              │
//! │                                                                         │
//! │  2. CLOSE (normal or forced)                                           │
//! │     └── close() → status: Closed + closing snapshot                    │
//! │         (guarded by `WHERE status = 'open'`)                           │
//! │                                                                         │
//! │  3. Nothing else. Closed rows are frozen by a trigger.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::error::{DbError, DbResult};
use clinic_core::{CashSession, SessionFilter, DEFAULT_HISTORY_LIMIT};

const SESSION_COLUMNS: &str = "id, actor_id, opening_balance, final_physical_amount, \
     closing_balance, difference, status, opened_at, closed_at, closed_by_actor_id, \
     notes, closing_notes, closure_reason";

/// Repository for cash session database operations.
///
/// Every method runs on the connection it is given, so callers decide
/// whether it is part of a write unit of work or a plain read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRepository;

impl SessionRepository {
    /// Inserts a freshly opened session.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `cash_sessions.actor_id` when the actor
    /// already has an open session.
    pub async fn insert(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, actor_id = %session.actor_id, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, actor_id, opening_balance, final_physical_amount,
                closing_balance, difference, status, opened_at,
                closed_at, closed_by_actor_id, notes, closing_notes, closure_reason
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13
            )
            "#,
        )
        .bind(&session.id)
        .bind(&session.actor_id)
        .bind(session.opening_balance)
        .bind(session.final_physical_amount)
        .bind(session.closing_balance)
        .bind(session.difference)
        .bind(session.status)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .bind(&session.closed_by_actor_id)
        .bind(&session.notes)
        .bind(&session.closing_notes)
        .bind(&session.closure_reason)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a session by ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = ?1");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Finds the actor's open session, if any.
    pub async fn find_open_for_actor(
        conn: &mut SqliteConnection,
        actor_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE actor_id = ?1 AND status = 'open'"
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(actor_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Writes the closing snapshot of a session that is still open.
    ///
    /// `closed` must carry the closed status and every closing field.
    pub async fn close(conn: &mut SqliteConnection, closed: &CashSession) -> DbResult<()> {
        debug!(id = %closed.id, difference = ?closed.difference, "Closing cash session");

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                status = ?2,
                final_physical_amount = ?3,
                closing_balance = ?4,
                difference = ?5,
                closed_at = ?6,
                closed_by_actor_id = ?7,
                closing_notes = ?8,
                closure_reason = ?9
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&closed.id)
        .bind(closed.status)
        .bind(closed.final_physical_amount)
        .bind(closed.closing_balance)
        .bind(closed.difference)
        .bind(closed.closed_at)
        .bind(&closed.closed_by_actor_id)
        .bind(&closed.closing_notes)
        .bind(&closed.closure_reason)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashSession (open)", &closed.id));
        }

        Ok(())
    }

    /// Lists sessions matching `filter`, newest first.
    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &SessionFilter,
    ) -> DbResult<Vec<CashSession>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE 1 = 1"
        ));

        if let Some(actor_id) = &filter.actor_id {
            qb.push(" AND actor_id = ").push_bind(actor_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.opened_from {
            qb.push(" AND opened_at >= ").push_bind(from);
        }
        if let Some(to) = filter.opened_to {
            qb.push(" AND opened_at <= ").push_bind(to);
        }

        let limit = filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        qb.push(" ORDER BY opened_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit));

        let sessions = qb
            .build_query_as::<CashSession>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(sessions)
    }
}

/// Generates a new session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
