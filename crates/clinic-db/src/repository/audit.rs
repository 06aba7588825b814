//! # Audit Entry Repository
//!
//! Append-only storage for the audit trail. There is no update or delete
//! here, and the triggers in the schema reject both.
//!
//! Snapshots (`old_values`, `new_values`) are stored as JSON text so the
//! search can match inside them.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, FromRow, QueryBuilder, Sqlite};
use tracing::debug;

use crate::error::{DbError, DbResult};
use clinic_core::{AuditEntry, AuditEvent, AuditQuery, AuditSearchField, AuditSubject};

const AUDIT_COLUMNS: &str =
    "id, subject_type, subject_id, event, actor_id, old_values, new_values, description, created_at";

/// Row shape of `audit_entries`.
#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    subject_type: String,
    subject_id: String,
    event: String,
    actor_id: String,
    old_values: Option<String>,
    new_values: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let subject = AuditSubject::from_parts(&row.subject_type, row.subject_id)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let event =
            AuditEvent::from_name(&row.event).map_err(|e| DbError::Serialization(e.to_string()))?;

        Ok(AuditEntry {
            id: row.id,
            subject,
            event,
            actor_id: row.actor_id,
            old_values: row.old_values.as_deref().map(serde_json::from_str).transpose()?,
            new_values: row.new_values.as_deref().map(serde_json::from_str).transpose()?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Repository for audit entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRepository;

impl AuditRepository {
    /// Appends one entry.
    pub async fn insert(conn: &mut SqliteConnection, entry: &AuditEntry) -> DbResult<()> {
        debug!(
            subject_type = %entry.subject.kind(),
            subject_id = %entry.subject.id(),
            event = %entry.event,
            "Appending audit entry"
        );

        let old_values = entry.old_values.as_ref().map(serde_json::to_string).transpose()?;
        let new_values = entry.new_values.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, subject_type, subject_id, event, actor_id,
                old_values, new_values, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.subject.kind().as_str())
        .bind(entry.subject.id())
        .bind(entry.event.name())
        .bind(&entry.actor_id)
        .bind(old_values)
        .bind(new_values)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Most recent entries for one subject.
    pub async fn history_for(
        conn: &mut SqliteConnection,
        subject: &AuditSubject,
        limit: u32,
    ) -> DbResult<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_entries \
             WHERE subject_type = ?1 AND subject_id = ?2 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(subject.kind().as_str())
            .bind(subject.id())
            .bind(i64::from(limit))
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Case-insensitive substring search over the query's fields, newest first.
    ///
    /// SQLite's `LOWER` and `LIKE` only fold ASCII, so rows in the date
    /// range are read page by page inside one read transaction and matched
    /// with Unicode case folding here.
    pub async fn search(conn: &mut SqliteConnection, query: &AuditQuery) -> DbResult<Vec<AuditEntry>> {
        let limit = query.limit as usize;
        let mut found = Vec::new();
        if limit == 0 {
            return Ok(found);
        }

        let needle = query.text.trim().to_lowercase();
        let fields = query.effective_fields();
        let mut tx = conn.begin().await?;
        let mut offset = 0_i64;

        loop {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE 1 = 1"));
            if let Some(from) = query.from {
                qb.push(" AND created_at >= ").push_bind(from);
            }
            if let Some(to) = query.to {
                qb.push(" AND created_at <= ").push_bind(to);
            }
            qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
                .push_bind(SEARCH_PAGE_SIZE)
                .push(" OFFSET ")
                .push_bind(offset);

            let page = qb.build_query_as::<AuditRow>().fetch_all(&mut *tx).await?;
            let exhausted = (page.len() as i64) < SEARCH_PAGE_SIZE;
            offset += page.len() as i64;

            for row in page {
                if row_matches(&row, &fields, &needle) {
                    found.push(AuditEntry::try_from(row)?);
                    if found.len() == limit {
                        return Ok(found);
                    }
                }
            }
            if exhausted {
                debug!(matches = found.len(), scanned = offset, "Audit search finished");
                return Ok(found);
            }
        }
    }
}

/// Rows read per round trip while searching.
const SEARCH_PAGE_SIZE: i64 = 500;

/// `needle` must already be lowercased. An empty needle matches every row.
fn row_matches(row: &AuditRow, fields: &[AuditSearchField], needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|field| {
        let text = match field {
            AuditSearchField::Description => row.description.as_deref(),
            AuditSearchField::Event => Some(row.event.as_str()),
            AuditSearchField::OldValues => row.old_values.as_deref(),
            AuditSearchField::NewValues => row.new_values.as_deref(),
        };
        text.is_some_and(|text| text.to_lowercase().contains(needle))
    })
}

/// Generates a new audit entry ID.
pub fn generate_audit_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use clinic_core::{SessionEvent, TransactionEvent};
    use serde_json::json;

    fn entry(subject: AuditSubject, event: AuditEvent, description: &str) -> AuditEntry {
        AuditEntry {
            id: generate_audit_id(),
            subject,
            event,
            actor_id: "cashier-1".into(),
            old_values: None,
            new_values: Some(json!({ "amount": 5_000_000, "payment_method": "cash" })),
            description: Some(description.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_history_newest_first_and_bounded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = AuditSubject::CashSession("s-1".into());

        let mut tx = db.begin_write().await.unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(session.clone(), SessionEvent::Opened.into(), "Opened"),
        )
        .await
        .unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(session.clone(), SessionEvent::Closed.into(), "Closed"),
        )
        .await
        .unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(
                AuditSubject::Transaction("t-1".into()),
                TransactionEvent::IncomeRecorded.into(),
                "Income",
            ),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let history = AuditRepository::history_for(&mut conn, &session, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event, AuditEvent::Session(SessionEvent::Closed));
        assert_eq!(history[1].event, AuditEvent::Session(SessionEvent::Opened));
        assert_eq!(
            history[0].new_values,
            Some(json!({ "amount": 5_000_000, "payment_method": "cash" }))
        );

        let bounded = AuditRepository::history_for(&mut conn, &session, 1)
            .await
            .unwrap();
        assert_eq!(bounded.len(), 1);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_literal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(
                AuditSubject::Transaction("t-1".into()),
                TransactionEvent::Voided.into(),
                "Duplicate charge for consultation",
            ),
        )
        .await
        .unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(
                AuditSubject::Transaction("t-2".into()),
                TransactionEvent::ExpenseRecorded.into(),
                "Gauze 100% cotton",
            ),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let found = AuditRepository::search(&mut conn, &AuditQuery::new("DUPLICATE"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject, AuditSubject::Transaction("t-1".into()));

        let found = AuditRepository::search(
            &mut conn,
            &AuditQuery::new("transaction_voided").in_fields([AuditSearchField::Event]),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);

        let found = AuditRepository::search(
            &mut conn,
            &AuditQuery::new("payment_method").in_fields([AuditSearchField::NewValues]),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 2);

        // '%' matches literally, not as a wildcard.
        let found = AuditRepository::search(&mut conn, &AuditQuery::new("100%"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let found = AuditRepository::search(
            &mut conn,
            &AuditQuery::new("duplicate").in_fields([AuditSearchField::Event]),
        )
        .await
        .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(
                AuditSubject::Transaction("t-1".into()),
                TransactionEvent::IncomeRecorded.into(),
                "CONSULTA MÉDICA",
            ),
        )
        .await
        .unwrap();
        AuditRepository::insert(
            tx.conn(),
            &entry(
                AuditSubject::Transaction("t-2".into()),
                TransactionEvent::IncomeRecorded.into(),
                "Ärztliche Untersuchung",
            ),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        for text in ["médica", "MÉDICA", "Médica"] {
            let found = AuditRepository::search(&mut conn, &AuditQuery::new(text))
                .await
                .unwrap();
            assert_eq!(found.len(), 1, "searching {text}");
            assert_eq!(found[0].subject, AuditSubject::Transaction("t-1".into()));
        }

        let found = AuditRepository::search(&mut conn, &AuditQuery::new("ärztliche"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject, AuditSubject::Transaction("t-2".into()));
    }

    #[tokio::test]
    async fn test_search_reads_past_the_first_page() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let start = Utc::now() - chrono::Duration::days(1);
        let total = SEARCH_PAGE_SIZE + 20;

        let mut tx = db.begin_write().await.unwrap();
        for i in 0..total {
            let description = if i < 3 { "Refund" } else { "Consultation" };
            let mut e = entry(
                AuditSubject::Transaction(format!("t-{i}")),
                TransactionEvent::IncomeRecorded.into(),
                description,
            );
            e.created_at = start + chrono::Duration::seconds(i);
            AuditRepository::insert(tx.conn(), &e).await.unwrap();
        }
        tx.commit().await.unwrap();

        let mut conn = db.acquire().await.unwrap();
        let found = AuditRepository::search(&mut conn, &AuditQuery::new("refund"))
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.subject.id()).collect();
        assert_eq!(ids, vec!["t-2", "t-1", "t-0"]);

        let found = AuditRepository::search(&mut conn, &AuditQuery::new("consultation").limit(5))
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].subject.id(), format!("t-{}", total - 1));
    }

    #[tokio::test]
    async fn test_entries_are_append_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        let e = entry(
            AuditSubject::CashSession("s-1".into()),
            SessionEvent::Opened.into(),
            "Opened",
        );
        AuditRepository::insert(tx.conn(), &e).await.unwrap();

        let err = sqlx::query("UPDATE audit_entries SET description = 'x'")
            .execute(tx.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));

        let err = sqlx::query("DELETE FROM audit_entries")
            .execute(tx.conn())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected(_)));
    }
}
