//! # Transaction Ledger
//!
//! Records income and expenses against open sessions, voids them after
//! closing and computes the totals everything else relies on.
//!
//! ## Void Flow
//! ```text
//! void(transaction_id, reason, actor)
//!      │
//!      ├── reason empty?                  → Validation
//!      ├── transaction voided already?    → AlreadyVoided
//!      ├── session still open?            → SessionStillOpen
//!      ├── now − closed_at > window?      → VoidWindowExpired
//!      │
//!      ▼
//! status = voided, void metadata set, `transaction_voided` audited
//! (amount, type and session never change; the closing snapshot stays)
//! ```

use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditRecord, AuditTrail};
use crate::error::{LedgerError, LedgerResult};
use clinic_core::rules::check_voidable;
use clinic_core::validation::{validate_amount, validate_optional_text, validate_reason};
use clinic_core::{
    Actor, AuditSubject, CashSession, Clock, CoreError, LedgerTotals, MethodTotals, Money,
    PaymentMethod, Transaction, TransactionEvent, TransactionFilter, TransactionMetadata,
    TransactionStatus, TransactionType,
};
use clinic_db::{generate_transaction_id, Database, SessionRepository, TransactionRepository};

/// A money movement about to be recorded.
#[derive(Debug, Clone)]
pub(crate) struct NewTransaction {
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub metadata: TransactionMetadata,
}

/// Transaction recording, voiding and aggregation.
#[derive(Clone)]
pub struct TransactionLedger {
    db: Database,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    void_window_hours: i64,
}

impl TransactionLedger {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
        void_window_hours: i64,
    ) -> Self {
        TransactionLedger {
            db,
            clock,
            audit,
            void_window_hours,
        }
    }

    /// Records a transaction against an open session.
    ///
    /// ## Errors
    /// - `Validation` when `amount` is not positive
    /// - `SessionNotFound`
    /// - `InvalidSessionState` when the session is closed
    pub async fn record(
        &self,
        session_id: &str,
        transaction_type: TransactionType,
        amount: Money,
        payment_method: PaymentMethod,
        actor: &dyn Actor,
        metadata: TransactionMetadata,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.db.begin_write().await?;

        let session = SessionRepository::get_by_id(tx.conn(), session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

        let new = NewTransaction {
            transaction_type,
            amount,
            payment_method,
            metadata,
        };
        let transaction = self.record_on(tx.conn(), &session, new, actor).await?;

        tx.commit().await?;
        Ok(transaction)
    }

    /// Records on the caller's connection; `session` must have been read on it.
    pub(crate) async fn record_on(
        &self,
        conn: &mut SqliteConnection,
        session: &CashSession,
        new: NewTransaction,
        actor: &dyn Actor,
    ) -> LedgerResult<Transaction> {
        validate_amount(new.amount)?;
        if !session.is_open() {
            return Err(
                CoreError::invalid_state(&session.id, session.status, "record transactions").into(),
            );
        }

        let metadata = new.metadata;
        let transaction = Transaction {
            id: generate_transaction_id(),
            session_id: session.id.clone(),
            transaction_type: new.transaction_type,
            amount: new.amount,
            payment_method: new.payment_method,
            status: TransactionStatus::Active,
            origin: metadata.origin,
            service_id: metadata.service_id,
            patient_id: metadata.patient_id,
            description: validate_optional_text("description", metadata.description.as_deref())?,
            category: validate_optional_text("category", metadata.category.as_deref())?,
            created_by_actor_id: actor.id().to_string(),
            created_at: self.clock.now(),
            voided_by_actor_id: None,
            voided_at: None,
            void_reason: None,
        };

        TransactionRepository::insert(conn, &transaction).await?;

        let event = TransactionEvent::recorded(transaction.origin, transaction.transaction_type);
        let description = transaction.description.clone().unwrap_or_else(|| {
            format!(
                "{} of {} ({})",
                transaction.transaction_type, transaction.amount, transaction.payment_method
            )
        });
        self.audit
            .record_on(
                conn,
                AuditRecord::new(
                    AuditSubject::Transaction(transaction.id.clone()),
                    event,
                    actor.id(),
                )
                .new_values(serde_json::to_value(&transaction)?)
                .description(description),
            )
            .await?;

        info!(
            transaction_id = %transaction.id,
            session_id = %transaction.session_id,
            actor_id = %actor.id(),
            amount = %transaction.amount,
            transaction_type = %transaction.transaction_type,
            "Transaction recorded"
        );

        Ok(transaction)
    }

    /// Voids a transaction of a closed session within the void window.
    ///
    /// The session's closing snapshot is left as it was.
    pub async fn void(
        &self,
        transaction_id: &str,
        reason: &str,
        actor: &dyn Actor,
    ) -> LedgerResult<Transaction> {
        let reason = validate_reason(reason)?;
        let mut tx = self.db.begin_write().await?;

        let transaction = TransactionRepository::get_by_id(tx.conn(), transaction_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        let session = SessionRepository::get_by_id(tx.conn(), &transaction.session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(transaction.session_id.clone()))?;

        let now = self.clock.now();
        if let Err(err) = check_voidable(&transaction, &session, now, self.void_window_hours) {
            warn!(
                transaction_id = %transaction_id,
                actor_id = %actor.id(),
                error = %err,
                "Void rejected"
            );
            return Err(err.into());
        }

        TransactionRepository::mark_voided(tx.conn(), transaction_id, actor.id(), now, &reason)
            .await?;

        let old_values = serde_json::to_value(&transaction)?;
        let voided = Transaction {
            status: TransactionStatus::Voided,
            voided_by_actor_id: Some(actor.id().to_string()),
            voided_at: Some(now),
            void_reason: Some(reason.clone()),
            ..transaction
        };

        self.audit
            .record_on(
                tx.conn(),
                AuditRecord::new(
                    AuditSubject::Transaction(voided.id.clone()),
                    TransactionEvent::Voided,
                    actor.id(),
                )
                .old_values(old_values)
                .new_values(serde_json::to_value(&voided)?)
                .description(reason),
            )
            .await?;

        tx.commit().await?;

        info!(
            transaction_id = %voided.id,
            session_id = %voided.session_id,
            actor_id = %actor.id(),
            amount = %voided.amount,
            "Transaction voided"
        );
        Ok(voided)
    }

    /// Income, expense, net and count for a session, read in one statement.
    pub async fn aggregate(&self, session_id: &str, only_active: bool) -> LedgerResult<LedgerTotals> {
        let mut conn = self.db.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;
        Self::aggregate_on(&mut conn, session_id, only_active).await
    }

    /// Aggregate on the caller's connection.
    pub(crate) async fn aggregate_on(
        conn: &mut SqliteConnection,
        session_id: &str,
        only_active: bool,
    ) -> LedgerResult<LedgerTotals> {
        Ok(TransactionRepository::totals(conn, session_id, only_active).await?)
    }

    /// A session's transactions, newest first.
    pub async fn list_for_session(
        &self,
        session_id: &str,
        filter: &TransactionFilter,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut conn = self.db.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;
        Ok(TransactionRepository::list_for_session(&mut conn, session_id, filter).await?)
    }

    /// Active totals per payment method.
    pub async fn totals_by_payment_method(&self, session_id: &str) -> LedgerResult<Vec<MethodTotals>> {
        let mut conn = self.db.acquire().await?;
        ensure_session_exists(&mut conn, session_id).await?;
        Ok(TransactionRepository::totals_by_payment_method(&mut conn, session_id).await?)
    }

    /// Loads one transaction.
    pub async fn get(&self, transaction_id: &str) -> LedgerResult<Transaction> {
        let mut conn = self.db.acquire().await?;
        TransactionRepository::get_by_id(&mut conn, transaction_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()).into())
    }

    pub fn void_window_hours(&self) -> i64 {
        self.void_window_hours
    }
}

async fn ensure_session_exists(conn: &mut SqliteConnection, session_id: &str) -> LedgerResult<()> {
    match SessionRepository::get_by_id(conn, session_id).await? {
        Some(_) => Ok(()),
        None => Err(LedgerError::from(CoreError::SessionNotFound(
            session_id.to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CashRegister;
    use chrono::{Duration, TimeZone, Utc};
    use clinic_core::{ManualClock, StaticActor};

    async fn register(clock: Arc<ManualClock>) -> CashRegister {
        CashRegister::in_memory_with_clock(clock).await.unwrap()
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_rejects_non_positive_amount() {
        let clock = Arc::new(ManualClock::new(start()));
        let register = register(clock).await;
        let cashier = StaticActor::new("cashier-1");

        let session = register
            .sessions()
            .open(&cashier, Money::from_major(100_000), None)
            .await
            .unwrap();

        let err = register
            .ledger()
            .record(
                &session.id,
                TransactionType::Income,
                Money::zero(),
                PaymentMethod::Cash,
                &cashier,
                TransactionMetadata::manual(None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_record_into_closed_session_is_rejected() {
        let clock = Arc::new(ManualClock::new(start()));
        let register = register(clock).await;
        let cashier = StaticActor::new("cashier-1");

        let session = register
            .sessions()
            .open(&cashier, Money::zero(), None)
            .await
            .unwrap();
        register
            .sessions()
            .close(&cashier, &session.id, Money::zero(), None)
            .await
            .unwrap();

        let err = register
            .ledger()
            .record(
                &session.id,
                TransactionType::Expense,
                Money::from_major(10),
                PaymentMethod::Cash,
                &cashier,
                TransactionMetadata::manual(Some("Coffee".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InvalidSessionState { .. })
        ));
    }

    #[tokio::test]
    async fn test_void_requires_reason_and_closed_session() {
        let clock = Arc::new(ManualClock::new(start()));
        let register = register(clock.clone()).await;
        let cashier = StaticActor::new("cashier-1");
        let admin = StaticActor::admin("admin-1");

        let session = register
            .sessions()
            .open(&cashier, Money::from_major(1_000), None)
            .await
            .unwrap();
        let income = register
            .ledger()
            .record(
                &session.id,
                TransactionType::Income,
                Money::from_major(500),
                PaymentMethod::Cash,
                &cashier,
                TransactionMetadata::manual(None),
            )
            .await
            .unwrap();

        let err = register.ledger().void(&income.id, "  ", &admin).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));

        let err = register
            .ledger()
            .void(&income.id, "Wrong amount", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::SessionStillOpen(_))));

        register
            .sessions()
            .close(&cashier, &session.id, Money::from_major(1_500), None)
            .await
            .unwrap();
        clock.advance(Duration::minutes(30));

        let voided = register
            .ledger()
            .void(&income.id, "Wrong amount", &admin)
            .await
            .unwrap();
        assert_eq!(voided.status, TransactionStatus::Voided);
        assert_eq!(voided.void_reason.as_deref(), Some("Wrong amount"));
        assert_eq!(voided.voided_by_actor_id.as_deref(), Some("admin-1"));

        let err = register
            .ledger()
            .void(&income.id, "Again", &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::AlreadyVoided(_))));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let clock = Arc::new(ManualClock::new(start()));
        let register = register(clock).await;
        let admin = StaticActor::admin("admin-1");

        let err = register.ledger().void("missing", "reason", &admin).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::TransactionNotFound(_))));

        let err = register.ledger().aggregate("missing", true).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_method_totals() {
        let clock = Arc::new(ManualClock::new(start()));
        let register = register(clock.clone()).await;
        let cashier = StaticActor::new("cashier-1");

        let session = register
            .sessions()
            .open(&cashier, Money::zero(), None)
            .await
            .unwrap();
        for (ty, major, method) in [
            (TransactionType::Income, 300, PaymentMethod::Cash),
            (TransactionType::Income, 200, PaymentMethod::CreditCard),
            (TransactionType::Expense, 50, PaymentMethod::Cash),
        ] {
            clock.advance(Duration::minutes(1));
            register
                .ledger()
                .record(
                    &session.id,
                    ty,
                    Money::from_major(major),
                    method,
                    &cashier,
                    TransactionMetadata::manual(None),
                )
                .await
                .unwrap();
        }

        let all = register
            .ledger()
            .list_for_session(&session.id, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].transaction_type, TransactionType::Expense);

        let cash = register
            .ledger()
            .list_for_session(&session.id, &TransactionFilter::paid_with(PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(cash.len(), 2);

        let by_method = register
            .ledger()
            .totals_by_payment_method(&session.id)
            .await
            .unwrap();
        assert_eq!(by_method.len(), 2);
        assert_eq!(by_method[0].payment_method, PaymentMethod::Cash);
        assert_eq!(by_method[0].income, Money::from_major(300));
        assert_eq!(by_method[0].expense, Money::from_major(50));
        assert_eq!(by_method[1].payment_method, PaymentMethod::CreditCard);
    }
}
