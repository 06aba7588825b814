//! # Audit Vocabulary
//!
//! Subjects, events and entries of the append-only audit trail.
//!
//! ## Why Closed Enums?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Free-text event names          Closed enum per subject kind           │
//! │  ─────────────────────          ────────────────────────────           │
//! │  "cash_regster_opened"  ✗       SessionEvent::Opened          ✓        │
//! │  (typo, silently stored)        (typo = compile error)                 │
//! │                                                                         │
//! │  subject_type = "Sessoin"  ✗    AuditSubject::CashSession(id) ✓        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stored form keeps the snake_case names (`cash_register_opened`,
//! `transaction_voided`, ...) so the table stays searchable by text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{TransactionOrigin, TransactionType};

// =============================================================================
// Subject
// =============================================================================

/// Kind of entity an audit entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    CashSession,
    Transaction,
}

impl SubjectKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::CashSession => "cash_session",
            SubjectKind::Transaction => "transaction",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "cash_session" => Ok(SubjectKind::CashSession),
            "transaction" => Ok(SubjectKind::Transaction),
            other => Err(ValidationError::NotAllowed {
                field: format!("subject type '{}'", other),
                allowed: vec!["cash_session".into(), "transaction".into()],
            }),
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-reference from an audit entry to the entity it describes.
///
/// Lookup only: the audit trail never owns its subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditSubject {
    CashSession(String),
    Transaction(String),
}

impl AuditSubject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            AuditSubject::CashSession(_) => SubjectKind::CashSession,
            AuditSubject::Transaction(_) => SubjectKind::Transaction,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AuditSubject::CashSession(id) | AuditSubject::Transaction(id) => id,
        }
    }

    /// Rebuilds a subject from its stored `(subject_type, subject_id)` pair.
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(match SubjectKind::parse(kind)? {
            SubjectKind::CashSession => AuditSubject::CashSession(id.into()),
            SubjectKind::Transaction => AuditSubject::Transaction(id.into()),
        })
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events that can happen to a cash session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    Opened,
    Closed,
    ForceClosed,
}

/// Events that can happen to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionEvent {
    ServicePaymentProcessed,
    SupplierPaymentProcessed,
    IncomeRecorded,
    ExpenseRecorded,
    Voided,
}

impl TransactionEvent {
    /// The event a freshly recorded transaction is audited with.
    pub fn recorded(origin: TransactionOrigin, transaction_type: TransactionType) -> Self {
        match (origin, transaction_type) {
            (TransactionOrigin::ServicePayment, _) => TransactionEvent::ServicePaymentProcessed,
            (TransactionOrigin::SupplierPayment, _) => TransactionEvent::SupplierPaymentProcessed,
            (TransactionOrigin::Manual, TransactionType::Income) => TransactionEvent::IncomeRecorded,
            (TransactionOrigin::Manual, TransactionType::Expense) => {
                TransactionEvent::ExpenseRecorded
            }
        }
    }
}

/// Tagged audit event; the tag is the subject kind it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "subject", content = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Session(SessionEvent),
    Transaction(TransactionEvent),
}

impl AuditEvent {
    /// Every event, in declaration order.
    pub const ALL: [AuditEvent; 8] = [
        AuditEvent::Session(SessionEvent::Opened),
        AuditEvent::Session(SessionEvent::Closed),
        AuditEvent::Session(SessionEvent::ForceClosed),
        AuditEvent::Transaction(TransactionEvent::ServicePaymentProcessed),
        AuditEvent::Transaction(TransactionEvent::SupplierPaymentProcessed),
        AuditEvent::Transaction(TransactionEvent::IncomeRecorded),
        AuditEvent::Transaction(TransactionEvent::ExpenseRecorded),
        AuditEvent::Transaction(TransactionEvent::Voided),
    ];

    /// Stored event name.
    pub const fn name(&self) -> &'static str {
        match self {
            AuditEvent::Session(SessionEvent::Opened) => "cash_register_opened",
            AuditEvent::Session(SessionEvent::Closed) => "cash_register_closed",
            AuditEvent::Session(SessionEvent::ForceClosed) => "cash_register_force_closed",
            AuditEvent::Transaction(TransactionEvent::ServicePaymentProcessed) => {
                "service_payment_processed"
            }
            AuditEvent::Transaction(TransactionEvent::SupplierPaymentProcessed) => {
                "supplier_payment_processed"
            }
            AuditEvent::Transaction(TransactionEvent::IncomeRecorded) => "income_recorded",
            AuditEvent::Transaction(TransactionEvent::ExpenseRecorded) => "expense_recorded",
            AuditEvent::Transaction(TransactionEvent::Voided) => "transaction_voided",
        }
    }

    /// Parses a stored event name.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        AuditEvent::ALL
            .into_iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "event".to_string(),
                reason: format!("unknown audit event '{}'", name),
            })
    }

    pub const fn subject_kind(&self) -> SubjectKind {
        match self {
            AuditEvent::Session(_) => SubjectKind::CashSession,
            AuditEvent::Transaction(_) => SubjectKind::Transaction,
        }
    }

    /// Rejects events recorded against the wrong kind of subject.
    pub fn ensure_applies_to(&self, subject: &AuditSubject) -> CoreResult<()> {
        if self.subject_kind() != subject.kind() {
            return Err(CoreError::SubjectMismatch {
                event: self.name().to_string(),
                subject_kind: subject.kind().to_string(),
            });
        }
        Ok(())
    }
}

impl From<SessionEvent> for AuditEvent {
    fn from(event: SessionEvent) -> Self {
        AuditEvent::Session(event)
    }
}

impl From<TransactionEvent> for AuditEvent {
    fn from(event: TransactionEvent) -> Self {
        AuditEvent::Transaction(event)
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Entry
// =============================================================================

/// One immutable record of a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    pub subject: AuditSubject,
    pub event: AuditEvent,
    pub actor_id: String,
    /// Snapshot before the change (`None` for creations).
    #[ts(type = "unknown")]
    pub old_values: Option<serde_json::Value>,
    /// Snapshot after the change.
    #[ts(type = "unknown")]
    pub new_values: Option<serde_json::Value>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Text fields the audit search can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditSearchField {
    Description,
    Event,
    OldValues,
    NewValues,
}

impl AuditSearchField {
    pub const ALL: [AuditSearchField; 4] = [
        AuditSearchField::Description,
        AuditSearchField::Event,
        AuditSearchField::OldValues,
        AuditSearchField::NewValues,
    ];
}

/// Audit search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub text: String,
    /// Empty means every field.
    pub fields: Vec<AuditSearchField>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl AuditQuery {
    pub fn new(text: impl Into<String>) -> Self {
        AuditQuery {
            text: text.into(),
            fields: Vec::new(),
            from: None,
            to: None,
            limit: crate::DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn in_fields(mut self, fields: impl IntoIterator<Item = AuditSearchField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Fields to search, defaulting to all of them.
    pub fn effective_fields(&self) -> Vec<AuditSearchField> {
        if self.fields.is_empty() {
            AuditSearchField::ALL.to_vec()
        } else {
            self.fields.clone()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
