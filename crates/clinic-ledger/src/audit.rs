//! # Audit Trail
//!
//! Append-only record of every state change of sessions and transactions.
//!
//! The other services write their audit entry on the connection of their
//! own unit of work (`record_on`), so a mutation and its audit entry commit
//! or roll back together. [`AuditTrail::record`] is the standalone form.

use serde_json::Value;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use clinic_core::validation::{validate_actor_id, validate_optional_text};
use clinic_core::{
    AuditEntry, AuditEvent, AuditQuery, AuditSubject, CashSession, Clock, CoreError, Transaction,
};
use clinic_db::{generate_audit_id, AuditRepository, Database, SessionRepository, TransactionRepository};

/// One entry about to be appended.
#[derive(Debug, Clone)]
pub(crate) struct AuditRecord {
    pub subject: AuditSubject,
    pub event: AuditEvent,
    pub actor_id: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub description: Option<String>,
}

impl AuditRecord {
    pub fn new(subject: AuditSubject, event: impl Into<AuditEvent>, actor_id: &str) -> Self {
        AuditRecord {
            subject,
            event: event.into(),
            actor_id: actor_id.to_string(),
            old_values: None,
            new_values: None,
            description: None,
        }
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The entity an audit subject points at.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSubject {
    CashSession(CashSession),
    Transaction(Transaction),
}

/// Append-only audit log service.
#[derive(Clone)]
pub struct AuditTrail {
    db: Database,
    clock: Arc<dyn Clock>,
    history_limit: u32,
}

impl AuditTrail {
    pub fn new(db: Database, clock: Arc<dyn Clock>, history_limit: u32) -> Self {
        AuditTrail {
            db,
            clock,
            history_limit,
        }
    }

    /// Appends one entry in its own unit of work.
    ///
    /// ## Errors
    /// `SubjectMismatch` when the event belongs to another kind of subject.
    pub async fn record(
        &self,
        subject: AuditSubject,
        event: AuditEvent,
        actor_id: &str,
        old_values: Option<Value>,
        new_values: Option<Value>,
        description: Option<&str>,
    ) -> LedgerResult<AuditEntry> {
        let record = AuditRecord {
            subject,
            event,
            actor_id: actor_id.to_string(),
            old_values,
            new_values,
            description: validate_optional_text("description", description)?,
        };

        let mut tx = self.db.begin_write().await?;
        let entry = self.record_on(tx.conn(), record).await?;
        tx.commit().await?;

        Ok(entry)
    }

    /// Appends one entry on the caller's connection.
    pub(crate) async fn record_on(
        &self,
        conn: &mut SqliteConnection,
        record: AuditRecord,
    ) -> LedgerResult<AuditEntry> {
        record.event.ensure_applies_to(&record.subject)?;
        validate_actor_id(&record.actor_id)?;

        let entry = AuditEntry {
            id: generate_audit_id(),
            subject: record.subject,
            event: record.event,
            actor_id: record.actor_id,
            old_values: record.old_values,
            new_values: record.new_values,
            description: record.description,
            created_at: self.clock.now(),
        };

        AuditRepository::insert(conn, &entry).await?;
        debug!(event = %entry.event, subject_id = %entry.subject.id(), "Audit entry recorded");

        Ok(entry)
    }

    /// Most recent entries for a subject. `None` uses the configured limit.
    pub async fn history_for(
        &self,
        subject: &AuditSubject,
        limit: Option<u32>,
    ) -> LedgerResult<Vec<AuditEntry>> {
        let mut conn = self.db.acquire().await?;
        let entries = AuditRepository::history_for(
            &mut conn,
            subject,
            limit.unwrap_or(self.history_limit),
        )
        .await?;

        Ok(entries)
    }

    /// Case-insensitive text search across the query's fields, newest first.
    pub async fn search(&self, query: &AuditQuery) -> LedgerResult<Vec<AuditEntry>> {
        let mut conn = self.db.acquire().await?;
        Ok(AuditRepository::search(&mut conn, query).await?)
    }

    /// Loads the entity a subject refers to.
    pub async fn resolve(&self, subject: &AuditSubject) -> LedgerResult<ResolvedSubject> {
        let mut conn = self.db.acquire().await?;

        match subject {
            AuditSubject::CashSession(id) => SessionRepository::get_by_id(&mut conn, id)
                .await?
                .map(ResolvedSubject::CashSession)
                .ok_or_else(|| LedgerError::from(CoreError::SessionNotFound(id.clone()))),
            AuditSubject::Transaction(id) => TransactionRepository::get_by_id(&mut conn, id)
                .await?
                .map(ResolvedSubject::Transaction)
                .ok_or_else(|| LedgerError::from(CoreError::TransactionNotFound(id.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{SessionEvent, SystemClock, TransactionEvent};
    use clinic_db::DbConfig;
    use serde_json::json;

    async fn trail() -> AuditTrail {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        AuditTrail::new(db, Arc::new(SystemClock), 50)
    }

    #[tokio::test]
    async fn test_record_and_history() {
        let trail = trail().await;
        let subject = AuditSubject::Transaction("t-1".into());

        trail
            .record(
                subject.clone(),
                TransactionEvent::IncomeRecorded.into(),
                "cashier-1",
                None,
                Some(json!({ "amount": 5_000_000 })),
                Some("Consultation"),
            )
            .await
            .unwrap();

        let history = trail.history_for(&subject, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor_id, "cashier-1");
        assert_eq!(history[0].description.as_deref(), Some("Consultation"));
    }

    #[tokio::test]
    async fn test_mismatched_event_is_rejected() {
        let trail = trail().await;
        let err = trail
            .record(
                AuditSubject::Transaction("t-1".into()),
                SessionEvent::Opened.into(),
                "cashier-1",
                None,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::SubjectMismatch { .. })
        ));

        let history = trail
            .history_for(&AuditSubject::Transaction("t-1".into()), None)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unknown_subject() {
        let trail = trail().await;
        let err = trail
            .resolve(&AuditSubject::CashSession("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::SessionNotFound(_))));
    }
}
