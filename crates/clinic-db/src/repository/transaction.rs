//! # Transaction Repository
//!
//! Database operations for ledger transactions.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. RECORD (session open)                                              │
//! │     └── insert() → Transaction { status: Active }                      │
//! │                                                                         │
//! │  2. (OPTIONAL) VOID (session closed, within window)                    │
//! │     └── mark_voided() → status: Voided + void metadata                 │
//! │         amount / type / session stay untouched (trigger)               │
//! │                                                                         │
//! │  Aggregates always read the table in one statement:                    │
//! │     totals()  ─ SUM(income), SUM(expense), COUNT                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::error::{DbError, DbResult};
use clinic_core::{LedgerTotals, MethodTotals, Money, PaymentMethod, Transaction, TransactionFilter};

const TRANSACTION_COLUMNS: &str = "id, session_id, transaction_type, amount, payment_method, \
     status, origin, service_id, patient_id, description, category, created_by_actor_id, \
     created_at, voided_by_actor_id, voided_at, void_reason";

/// Repository for ledger transaction database operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    /// Inserts a new active transaction.
    ///
    /// ## Errors
    /// `DbError::Rejected` when the session is not open (trigger).
    pub async fn insert(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<()> {
        debug!(
            id = %transaction.id,
            session_id = %transaction.session_id,
            amount = %transaction.amount,
            "Inserting transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, session_id, transaction_type, amount, payment_method,
                status, origin, service_id, patient_id, description, category,
                created_by_actor_id, created_at,
                voided_by_actor_id, voided_at, void_reason
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13,
                ?14, ?15, ?16
            )
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.session_id)
        .bind(transaction.transaction_type)
        .bind(transaction.amount)
        .bind(transaction.payment_method)
        .bind(transaction.status)
        .bind(transaction.origin)
        .bind(&transaction.service_id)
        .bind(&transaction.patient_id)
        .bind(&transaction.description)
        .bind(&transaction.category)
        .bind(&transaction.created_by_actor_id)
        .bind(transaction.created_at)
        .bind(&transaction.voided_by_actor_id)
        .bind(transaction.voided_at)
        .bind(&transaction.void_reason)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Transaction>> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
        let transaction = sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(transaction)
    }

    /// Flips an active transaction to voided and stores the void metadata.
    pub async fn mark_voided(
        conn: &mut SqliteConnection,
        id: &str,
        voided_by_actor_id: &str,
        voided_at: DateTime<Utc>,
        reason: &str,
    ) -> DbResult<()> {
        debug!(id = %id, voided_by = %voided_by_actor_id, "Voiding transaction");

        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                status = 'voided',
                voided_by_actor_id = ?2,
                voided_at = ?3,
                void_reason = ?4
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(voided_by_actor_id)
        .bind(voided_at)
        .bind(reason)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction (active)", id));
        }

        Ok(())
    }

    /// Income, expense and count for a session in a single statement.
    ///
    /// With `only_active` voided transactions are left out.
    pub async fn totals(
        conn: &mut SqliteConnection,
        session_id: &str,
        only_active: bool,
    ) -> DbResult<LedgerTotals> {
        let (income, expense, count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount ELSE 0 END), 0),
                COUNT(*)
            FROM transactions
            WHERE session_id = ?1 AND (?2 = 0 OR status = 'active')
            "#,
        )
        .bind(session_id)
        .bind(only_active)
        .fetch_one(&mut *conn)
        .await?;

        Ok(LedgerTotals::new(
            Money::from_cents(income),
            Money::from_cents(expense),
            count,
        ))
    }

    /// Number of voided transactions in a session.
    pub async fn voided_count(conn: &mut SqliteConnection, session_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE session_id = ?1 AND status = 'voided'",
        )
        .bind(session_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    /// Active totals per payment method, in a stable method order.
    pub async fn totals_by_payment_method(
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> DbResult<Vec<MethodTotals>> {
        let rows: Vec<(PaymentMethod, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                payment_method,
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount ELSE 0 END), 0),
                COUNT(*)
            FROM transactions
            WHERE session_id = ?1 AND status = 'active'
            GROUP BY payment_method
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut totals: Vec<MethodTotals> = rows
            .into_iter()
            .map(|(payment_method, income, expense, count)| MethodTotals {
                payment_method,
                income: Money::from_cents(income),
                expense: Money::from_cents(expense),
                count,
            })
            .collect();
        totals.sort_by_key(|t| {
            PaymentMethod::ALL
                .iter()
                .position(|m| *m == t.payment_method)
        });

        Ok(totals)
    }

    /// Lists a session's transactions, newest first.
    pub async fn list_for_session(
        conn: &mut SqliteConnection,
        session_id: &str,
        filter: &TransactionFilter,
    ) -> DbResult<Vec<Transaction>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE session_id = "
        ));
        qb.push_bind(session_id.to_string());

        if let Some(transaction_type) = filter.transaction_type {
            qb.push(" AND transaction_type = ").push_bind(transaction_type);
        }
        if let Some(payment_method) = filter.payment_method {
            qb.push(" AND payment_method = ").push_bind(payment_method);
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC");

        let transactions = qb
            .build_query_as::<Transaction>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(transactions)
    }
}

/// Generates a new transaction ID.
pub fn generate_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::session::SessionRepository;
    use crate::{Database, DbConfig};
    use clinic_core::{
        CashSession, SessionStatus, TransactionOrigin, TransactionStatus, TransactionType,
    };

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        SessionRepository::insert(
            tx.conn(),
            &CashSession {
                id: "s-1".into(),
                actor_id: "cashier-1".into(),
                opening_balance: Money::from_major(100_000),
                final_physical_amount: None,
                closing_balance: None,
                difference: None,
                status: SessionStatus::Open,
                opened_at: Utc::now(),
                closed_at: None,
                closed_by_actor_id: None,
                notes: None,
                closing_notes: None,
                closure_reason: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        db
    }

    fn transaction(
        id: &str,
        transaction_type: TransactionType,
        major: i64,
        payment_method: PaymentMethod,
    ) -> Transaction {
        Transaction {
            id: id.into(),
            session_id: "s-1".into(),
            transaction_type,
            amount: Money::from_major(major),
            payment_method,
            status: TransactionStatus::Active,
            origin: TransactionOrigin::Manual,
            service_id: None,
            patient_id: None,
            description: None,
            category: None,
            created_by_actor_id: "cashier-1".into(),
            created_at: Utc::now(),
            voided_by_actor_id: None,
            voided_at: None,
            void_reason: None,
        }
    }

    #[tokio::test]
    async fn test_totals_with_and_without_voided() {
        let db = setup().await;
        let mut tx = db.begin_write().await.unwrap();

        for t in [
            transaction("t-1", TransactionType::Income, 50_000, PaymentMethod::Cash),
            transaction("t-2", TransactionType::Expense, 20_000, PaymentMethod::Cash),
            transaction("t-3", TransactionType::Income, 30_000, PaymentMethod::DebitCard),
        ] {
            TransactionRepository::insert(tx.conn(), &t).await.unwrap();
        }
        TransactionRepository::mark_voided(tx.conn(), "t-3", "admin-1", Utc::now(), "duplicate")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let active = TransactionRepository::totals(&mut conn, "s-1", true)
            .await
            .unwrap();
        assert_eq!(active.income, Money::from_major(50_000));
        assert_eq!(active.expense, Money::from_major(20_000));
        assert_eq!(active.net, Money::from_major(30_000));
        assert_eq!(active.count, 2);

        let all = TransactionRepository::totals(&mut conn, "s-1", false)
            .await
            .unwrap();
        assert_eq!(all.income, Money::from_major(80_000));
        assert_eq!(all.count, 3);

        assert_eq!(
            TransactionRepository::voided_count(&mut conn, "s-1")
                .await
                .unwrap(),
            1
        );

        let by_method = TransactionRepository::totals_by_payment_method(&mut conn, "s-1")
            .await
            .unwrap();
        assert_eq!(by_method.len(), 1);
        assert_eq!(by_method[0].payment_method, PaymentMethod::Cash);
        assert_eq!(by_method[0].count, 2);
    }

    #[tokio::test]
    async fn test_totals_of_empty_session_are_zero() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let totals = TransactionRepository::totals(&mut conn, "s-1", true)
            .await
            .unwrap();
        assert_eq!(totals, LedgerTotals::default());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let db = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        for t in [
            transaction("t-1", TransactionType::Income, 100, PaymentMethod::Cash),
            transaction("t-2", TransactionType::Expense, 50, PaymentMethod::Transfer),
            transaction("t-3", TransactionType::Income, 70, PaymentMethod::Cash),
        ] {
            TransactionRepository::insert(tx.conn(), &t).await.unwrap();
        }
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let all = TransactionRepository::list_for_session(
            &mut conn,
            "s-1",
            &TransactionFilter::default(),
        )
        .await
        .unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-3", "t-2", "t-1"]);

        let income = TransactionRepository::list_for_session(
            &mut conn,
            "s-1",
            &TransactionFilter::of_type(TransactionType::Income),
        )
        .await
        .unwrap();
        assert_eq!(income.len(), 2);

        let transfers = TransactionRepository::list_for_session(
            &mut conn,
            "s-1",
            &TransactionFilter::paid_with(PaymentMethod::Transfer),
        )
        .await
        .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].id, "t-2");
    }

    #[tokio::test]
    async fn test_storage_rules_on_transactions() {
        let db = setup().await;
        let mut tx = db.begin_write().await.unwrap();
        TransactionRepository::insert(
            tx.conn(),
            &transaction("t-1", TransactionType::Income, 100, PaymentMethod::Cash),
        )
        .await
        .unwrap();

        let err = sqlx::query("UPDATE transactions SET amount = 1 WHERE id = 't-1'")
            .execute(tx.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let err = sqlx::query("DELETE FROM transactions WHERE id = 't-1'")
            .execute(tx.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let mut zero = transaction("t-2", TransactionType::Income, 0, PaymentMethod::Cash);
        zero.amount = Money::zero();
        let err = TransactionRepository::insert(tx.conn(), &zero)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let mut orphan = transaction("t-3", TransactionType::Income, 10, PaymentMethod::Cash);
        orphan.session_id = "missing".into();
        assert!(TransactionRepository::insert(tx.conn(), &orphan).await.is_err());
    }
}
