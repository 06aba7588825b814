//! # Error Types
//!
//! Domain-specific error types for clinic-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  clinic-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  clinic-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  clinic-ledger errors                                                  │
//! │  └── LedgerError      - What the HTTP layer sees (with ErrorCode)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                          DbError ───┴─► LedgerError → HTTP response    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (session ID, amounts, etc.)
//! 3. Each void precondition has its own variant; the cashier needs to
//!    know which corrective action applies

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the cash register.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The actor already has an open cash session.
    ///
    /// ## User Workflow
    /// ```text
    /// Open register (opening balance: $100,000)
    ///      │
    ///      ▼
    /// Lookup open session for actor → found
    ///      │
    ///      ▼
    /// SessionAlreadyOpen → UI: "Close your existing session first"
    /// ```
    #[error("Actor {actor_id} already has an open cash session{}", session_id.as_ref().map(|s| format!(" ({})", s)).unwrap_or_default())]
    SessionAlreadyOpen {
        actor_id: String,
        session_id: Option<String>,
    },

    /// Operation attempted against a session in the wrong lifecycle state.
    #[error("Cash session {session_id} is {status}, cannot {operation}")]
    InvalidSessionState {
        session_id: String,
        status: String,
        operation: String,
    },

    /// Only the owning cashier may close a session normally.
    #[error("Cash session {session_id} belongs to another actor; use a forced closure instead")]
    NotSessionOwner { session_id: String, actor_id: String },

    /// Cash session cannot be found.
    #[error("Cash session not found: {0}")]
    SessionNotFound(String),

    /// Transaction cannot be found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Transaction has already been voided.
    #[error("Transaction {0} has already been voided")]
    AlreadyVoided(String),

    /// Transactions of an open session are corrected directly, not voided.
    #[error("Cannot void a transaction in an open session; edit or delete it directly instead (transaction {0})")]
    SessionStillOpen(String),

    /// The void window after closing has elapsed.
    #[error("Void window expired for transaction {transaction_id}: session closed at {closed_at}, transactions can only be voided within {window_hours} hours")]
    VoidWindowExpired {
        transaction_id: String,
        closed_at: DateTime<Utc>,
        window_hours: i64,
    },

    /// Payment attempted without an open cash session.
    #[error("Actor {0} has no open cash session; open one before processing payments")]
    NoActiveSession(String),

    /// The actor lacks a capability required by the calling layer.
    #[error("Actor {actor_id} lacks capability '{capability}'")]
    MissingCapability { actor_id: String, capability: String },

    /// Balance arithmetic left the representable range.
    #[error("Amount overflow while computing the {operation}")]
    AmountOverflow { operation: String },

    /// An audit event was recorded against the wrong kind of subject.
    #[error("Audit event '{event}' cannot be recorded against a {subject_kind}")]
    SubjectMismatch { event: String, subject_kind: String },
}

impl CoreError {
    /// Creates an InvalidSessionState error.
    pub fn invalid_state(
        session_id: impl Into<String>,
        status: impl std::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidSessionState {
            session_id: session_id.into(),
            status: status.to_string(),
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// They are always recoverable by correcting the input and are never
/// retried automatically.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value exceeds the largest amount the register accepts.
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: Money },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
