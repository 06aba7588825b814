//! # Payment Orchestrator
//!
//! Entry point for the payment screens. Resolves the cashier's open
//! session and records the payment against it in one unit of work.
//!
//! ```text
//! process_service_payment(actor, service, amount, details)
//!      │
//!      ├── actor has an open session? ── no ──► NoActiveSession
//!      │
//!      ▼
//! TransactionLedger::record_on (income, origin = service_payment)
//!      │
//!      ▼
//! audit: service_payment_processed
//! ```

use tracing::debug;

use crate::error::LedgerResult;
use crate::ledger::{NewTransaction, TransactionLedger};
use clinic_core::validation::{validate_optional_text, validate_required_text};
use clinic_core::{
    Actor, BillableService, CashSession, CoreError, Money, ServicePaymentDetails,
    SupplierPaymentDetails, Transaction, TransactionMetadata, TransactionType,
};
use clinic_db::{Database, SessionRepository};

/// Records service and supplier payments against the caller's open session.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    db: Database,
    ledger: TransactionLedger,
}

impl PaymentOrchestrator {
    pub fn new(db: Database, ledger: TransactionLedger) -> Self {
        PaymentOrchestrator { db, ledger }
    }

    /// Records a patient's payment for a billable service as income.
    ///
    /// `amount` may differ from the catalog price (discounts, partial
    /// payments); the price is only logged for comparison.
    pub async fn process_service_payment(
        &self,
        actor: &dyn Actor,
        service: &BillableService,
        amount: Money,
        details: ServicePaymentDetails,
    ) -> LedgerResult<Transaction> {
        if amount != service.price {
            debug!(
                service_id = %service.id,
                price = %service.price,
                amount = %amount,
                "Service charged at a different amount than listed"
            );
        }

        let notes = validate_optional_text("notes", details.notes.as_deref())?;
        let description = match notes {
            Some(notes) => format!("{}: {}", service.name, notes),
            None => service.name.clone(),
        };
        let metadata = TransactionMetadata::service_payment(service.id.clone(), details.patient_id)
            .with_description(Some(description));

        self.record_for_actor(
            actor,
            NewTransaction {
                transaction_type: TransactionType::Income,
                amount,
                payment_method: details.payment_method,
                metadata,
            },
        )
        .await
    }

    /// Records a payment to a supplier as an expense.
    pub async fn process_supplier_payment(
        &self,
        actor: &dyn Actor,
        amount: Money,
        description: &str,
        details: SupplierPaymentDetails,
    ) -> LedgerResult<Transaction> {
        let description = validate_required_text("description", description)?;
        let metadata = TransactionMetadata::supplier_payment(description, details.category);

        self.record_for_actor(
            actor,
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount,
                payment_method: details.payment_method,
                metadata,
            },
        )
        .await
    }

    /// Voids a transaction; see [`TransactionLedger::void`].
    pub async fn void_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
        actor: &dyn Actor,
    ) -> LedgerResult<Transaction> {
        self.ledger.void(transaction_id, reason, actor).await
    }

    async fn record_for_actor(
        &self,
        actor: &dyn Actor,
        new: NewTransaction,
    ) -> LedgerResult<Transaction> {
        let mut tx = self.db.begin_write().await?;

        let session: CashSession = SessionRepository::find_open_for_actor(tx.conn(), actor.id())
            .await?
            .ok_or_else(|| CoreError::NoActiveSession(actor.id().to_string()))?;

        let transaction = self.ledger.record_on(tx.conn(), &session, new, actor).await?;
        tx.commit().await?;

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::CashRegister;
    use clinic_core::{
        AuditEvent, AuditSubject, PaymentMethod, StaticActor, TransactionEvent, TransactionOrigin,
    };

    fn consultation() -> BillableService {
        BillableService {
            id: "svc-consult".into(),
            name: "General consultation".into(),
            price: Money::from_major(50_000),
        }
    }

    #[tokio::test]
    async fn test_payment_without_session_is_rejected() {
        let register = CashRegister::in_memory().await.unwrap();
        let err = register
            .payments()
            .process_service_payment(
                &StaticActor::new("cashier-1"),
                &consultation(),
                Money::from_major(50_000),
                ServicePaymentDetails {
                    payment_method: PaymentMethod::Cash,
                    patient_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::NoActiveSession(_))));
    }

    #[tokio::test]
    async fn test_service_payment_is_income_with_service_link() {
        let register = CashRegister::in_memory().await.unwrap();
        let cashier = StaticActor::new("cashier-1");
        let session = register
            .sessions()
            .open(&cashier, Money::from_major(100_000), None)
            .await
            .unwrap();

        let payment = register
            .payments()
            .process_service_payment(
                &cashier,
                &consultation(),
                Money::from_major(45_000),
                ServicePaymentDetails {
                    payment_method: PaymentMethod::DebitCard,
                    patient_id: Some("patient-7".into()),
                    notes: Some("Loyalty discount".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(payment.session_id, session.id);
        assert_eq!(payment.transaction_type, TransactionType::Income);
        assert_eq!(payment.origin, TransactionOrigin::ServicePayment);
        assert_eq!(payment.service_id.as_deref(), Some("svc-consult"));
        assert_eq!(payment.patient_id.as_deref(), Some("patient-7"));
        assert_eq!(
            payment.description.as_deref(),
            Some("General consultation: Loyalty discount")
        );

        let history = register
            .audit()
            .history_for(&AuditSubject::Transaction(payment.id.clone()), None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].event,
            AuditEvent::Transaction(TransactionEvent::ServicePaymentProcessed)
        );
    }

    #[tokio::test]
    async fn test_supplier_payment_requires_description() {
        let register = CashRegister::in_memory().await.unwrap();
        let cashier = StaticActor::new("cashier-1");
        register
            .sessions()
            .open(&cashier, Money::from_major(100_000), None)
            .await
            .unwrap();

        let details = SupplierPaymentDetails {
            payment_method: PaymentMethod::Cash,
            category: Some("supplies".into()),
        };

        let err = register
            .payments()
            .process_supplier_payment(&cashier, Money::from_major(20_000), "   ", details.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::Validation(_))));

        let expense = register
            .payments()
            .process_supplier_payment(&cashier, Money::from_major(20_000), "Gloves", details)
            .await
            .unwrap();
        assert_eq!(expense.transaction_type, TransactionType::Expense);
        assert_eq!(expense.origin, TransactionOrigin::SupplierPayment);
        assert_eq!(expense.category.as_deref(), Some("supplies"));
        assert_eq!(expense.description.as_deref(), Some("Gloves"));
    }
}
