//! # Domain Types
//!
//! Core domain types of the cash register ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐        ┌─────────────────────┐                │
//! │  │    CashSession      │ 1    * │    Transaction      │                │
//! │  │  ─────────────────  │◄───────│  ─────────────────  │                │
//! │  │  id (UUID)          │        │  id (UUID)          │                │
//! │  │  actor_id           │        │  session_id (FK)    │                │
//! │  │  opening_balance    │        │  transaction_type   │                │
//! │  │  status             │        │  amount (> 0)       │                │
//! │  │  closing_balance    │        │  payment_method     │                │
//! │  │  difference         │        │  status             │                │
//! │  └─────────────────────┘        └─────────────────────┘                │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ SessionStatus   │   │ TransactionType │   │ PaymentMethod   │       │
//! │  │  Open           │   │  Income         │   │  Cash           │       │
//! │  │  Closed         │   │  Expense        │   │  DebitCard ...  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions own their transactions; neither is ever deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle state of a cash session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transaction Type / Status
// =============================================================================

/// Direction of a money movement. Amounts are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money into the drawer (patient payments).
    Income,
    /// Money out of the drawer (supplier payments, petty cash).
    Expense,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a transaction still counts toward balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Voided,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Active
    }
}

impl TransactionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the money moved. These are labels only; nothing is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    Transfer,
    Check,
    Other,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::DebitCard,
        PaymentMethod::CreditCard,
        PaymentMethod::Transfer,
        PaymentMethod::Check,
        PaymentMethod::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| crate::error::ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Transaction Origin
// =============================================================================

/// What produced a transaction. Decides the audit event it is recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOrigin {
    /// Payment for a medical service.
    ServicePayment,
    /// Payment to a supplier.
    SupplierPayment,
    /// Entered directly at the register.
    Manual,
}

// =============================================================================
// Cash Session
// =============================================================================

/// A cashier's continuous custody of a physical cash drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The cashier who owns the drawer.
    pub actor_id: String,

    /// Cash counted into the drawer at opening (>= 0).
    pub opening_balance: Money,

    /// Cash physically counted at closing.
    pub final_physical_amount: Option<Money>,

    /// Calculated balance frozen at closing time.
    pub closing_balance: Option<Money>,

    /// `final_physical_amount - closing_balance`, frozen at closing time.
    pub difference: Option<Money>,

    pub status: SessionStatus,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    /// Set iff status is closed.
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Supervisor who forced the closure. `None` for a normal close.
    pub closed_by_actor_id: Option<String>,

    /// Notes entered at opening.
    pub notes: Option<String>,

    /// Notes entered at closing.
    pub closing_notes: Option<String>,

    /// Why the session was force-closed.
    pub closure_reason: Option<String>,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }

    /// True when a supervisor closed the session on the owner's behalf.
    #[inline]
    pub fn was_force_closed(&self) -> bool {
        self.closed_by_actor_id.is_some()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One money movement recorded against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub session_id: String,
    pub transaction_type: TransactionType,
    /// Always strictly positive; direction is carried by `transaction_type`.
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub origin: TransactionOrigin,
    /// Medical service paid for (service payments only).
    pub service_id: Option<String>,
    pub patient_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by_actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub voided_by_actor_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

impl Transaction {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Signed effect on the drawer: positive for income, negative for expense.
    pub fn signed_amount(&self) -> Money {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }
}

/// Reference data attached to a recorded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub origin: TransactionOrigin,
    pub service_id: Option<String>,
    pub patient_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl TransactionMetadata {
    /// Metadata for a medical-service payment.
    pub fn service_payment(service_id: impl Into<String>, patient_id: Option<String>) -> Self {
        TransactionMetadata {
            origin: TransactionOrigin::ServicePayment,
            service_id: Some(service_id.into()),
            patient_id,
            description: None,
            category: None,
        }
    }

    /// Metadata for a supplier payment.
    pub fn supplier_payment(description: impl Into<String>, category: Option<String>) -> Self {
        TransactionMetadata {
            origin: TransactionOrigin::SupplierPayment,
            service_id: None,
            patient_id: None,
            description: Some(description.into()),
            category,
        }
    }

    /// Metadata for an entry typed in at the register.
    pub fn manual(description: Option<String>) -> Self {
        TransactionMetadata {
            origin: TransactionOrigin::Manual,
            service_id: None,
            patient_id: None,
            description,
            category: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        if description.is_some() {
            self.description = description;
        }
        self
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Sums over a session's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerTotals {
    pub income: Money,
    pub expense: Money,
    /// `income - expense`
    pub net: Money,
    pub count: i64,
}

impl LedgerTotals {
    pub fn new(income: Money, expense: Money, count: i64) -> Self {
        LedgerTotals {
            income,
            expense,
            net: income - expense,
            count,
        }
    }
}

/// Active totals for one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotals {
    pub payment_method: PaymentMethod,
    pub income: Money,
    pub expense: Money,
    pub count: i64,
}

/// Reconciliation view of one session.
///
/// `closing_balance`/`difference` are the frozen snapshot;
/// `current_balance` is recomputed from active transactions, so the two
/// diverge when a transaction is voided after closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionSummary {
    pub session: CashSession,
    pub totals: LedgerTotals,
    pub voided_count: i64,
    pub current_balance: Money,
    pub closing_balance: Option<Money>,
    pub difference: Option<Money>,
    /// `current_balance - closing_balance` for closed sessions.
    pub post_close_drift: Option<Money>,
    pub by_payment_method: Vec<MethodTotals>,
}

// =============================================================================
// Query Filters
// =============================================================================

/// Filters for listing a session's transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub payment_method: Option<PaymentMethod>,
}

impl TransactionFilter {
    pub fn of_type(transaction_type: TransactionType) -> Self {
        TransactionFilter {
            transaction_type: Some(transaction_type),
            payment_method: None,
        }
    }

    pub fn paid_with(payment_method: PaymentMethod) -> Self {
        TransactionFilter {
            transaction_type: None,
            payment_method: Some(payment_method),
        }
    }
}

/// Filters for the supervisor's session list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub actor_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub opened_from: Option<DateTime<Utc>>,
    pub opened_to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// =============================================================================
// External Collaborators
// =============================================================================

/// A priced medical service from the clinic catalog.
///
/// Owned by the catalog module of the wider application; the ledger only
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillableService {
    pub id: String,
    pub name: String,
    pub price: Money,
}

/// Cashier input for a service payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePaymentDetails {
    pub payment_method: PaymentMethod,
    pub patient_id: Option<String>,
    pub notes: Option<String>,
}

/// Cashier input for a supplier payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPaymentDetails {
    pub payment_method: PaymentMethod,
    pub category: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(
            " Debit_Card ".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::DebitCard
        );
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_ledger_totals_net() {
        let totals = LedgerTotals::new(Money::from_major(50_000), Money::from_major(20_000), 2);
        assert_eq!(totals.net, Money::from_major(30_000));
    }

    #[test]
    fn test_status_display_matches_storage() {
        assert_eq!(SessionStatus::Open.to_string(), "open");
        assert_eq!(TransactionStatus::Voided.to_string(), "voided");
        assert_eq!(PaymentMethod::CreditCard.to_string(), "credit_card");
    }

    #[test]
    fn test_metadata_constructors() {
        let meta = TransactionMetadata::service_payment("svc-1", Some("pat-9".into()));
        assert_eq!(meta.origin, TransactionOrigin::ServicePayment);
        assert_eq!(meta.service_id.as_deref(), Some("svc-1"));

        let meta = TransactionMetadata::supplier_payment("Gloves", Some("supplies".into()));
        assert_eq!(meta.origin, TransactionOrigin::SupplierPayment);
        assert_eq!(meta.description.as_deref(), Some("Gloves"));
    }

    #[test]
    fn test_transaction_filter_default_is_unfiltered() {
        let filter = TransactionFilter::default();
        assert!(filter.transaction_type.is_none());
        assert!(filter.payment_method.is_none());
    }
}
