//! # Ledger Error Type
//!
//! Unified error type returned by every cash register service.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Cash Register                      │
//! │                                                                         │
//! │  HTTP controller             clinic-ledger service                      │
//! │  ───────────────             ─────────────────────                      │
//! │                                                                         │
//! │  sessions.close(..)                                                     │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Result<T, LedgerError>                                          │  │
//! │  │         │                                                        │  │
//! │  │  Rule violated? ─── CoreError::NotSessionOwner ─┐                │  │
//! │  │         │                                       │                │  │
//! │  │  Storage failed? ── DbError::QueryFailed ───────┼─► LedgerError  │  │
//! │  │         │                                       │     │          │  │
//! │  │  Bad config? ────── ConfigError ────────────────┘     │          │  │
//! │  └───────────────────────────────────────────────────────┼──────────┘  │
//! │                                                          ▼             │
//! │  ErrorResponse { code: "NOT_SESSION_OWNER", message: "..." }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use clinic_core::{CoreError, ValidationError};
use clinic_db::DbError;

/// Error returned by the cash register services.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure. The whole unit of work was rolled back.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

/// Result type for the cash register services.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Stable error codes for the HTTP layer.
///
/// ## Usage in the Front End
/// ```typescript
/// switch (e.code) {
///   case 'SESSION_ALREADY_OPEN':
///     showNotification('Close your open register first');
///     break;
///   case 'VOID_WINDOW_EXPIRED':
///     showError(e.message);
///     break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// The actor already has an open session (409)
    SessionAlreadyOpen,

    /// Operation not allowed in the session's current state (409)
    InvalidSessionState,

    /// Normal close attempted by someone other than the owner (403)
    NotSessionOwner,

    /// Resource not found (404)
    NotFound,

    /// Transaction already voided (409)
    AlreadyVoided,

    /// Void attempted while the session is still open (409)
    SessionStillOpen,

    /// Void attempted after the window closed (409)
    VoidWindowExpired,

    /// Payment attempted without an open session (409)
    NoActiveSession,

    /// Capability missing (403)
    Forbidden,

    /// Totals no longer fit the money type (422)
    AmountOutOfRange,

    /// Audit event/subject mismatch (500, programming error)
    Internal,

    /// Database operation failed (500)
    DatabaseError,

    /// Configuration could not be loaded (500)
    ConfigError,
}

impl LedgerError {
    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::Core(err) => match err {
                CoreError::Validation(_) => ErrorCode::ValidationError,
                CoreError::SessionAlreadyOpen { .. } => ErrorCode::SessionAlreadyOpen,
                CoreError::InvalidSessionState { .. } => ErrorCode::InvalidSessionState,
                CoreError::NotSessionOwner { .. } => ErrorCode::NotSessionOwner,
                CoreError::SessionNotFound(_) | CoreError::TransactionNotFound(_) => {
                    ErrorCode::NotFound
                }
                CoreError::AlreadyVoided(_) => ErrorCode::AlreadyVoided,
                CoreError::SessionStillOpen(_) => ErrorCode::SessionStillOpen,
                CoreError::VoidWindowExpired { .. } => ErrorCode::VoidWindowExpired,
                CoreError::NoActiveSession(_) => ErrorCode::NoActiveSession,
                CoreError::MissingCapability { .. } => ErrorCode::Forbidden,
                CoreError::AmountOverflow { .. } => ErrorCode::AmountOutOfRange,
                CoreError::SubjectMismatch { .. } => ErrorCode::Internal,
            },
            LedgerError::Db(DbError::NotFound { .. }) => ErrorCode::NotFound,
            LedgerError::Db(_) => ErrorCode::DatabaseError,
            LedgerError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// The core error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// What the HTTP layer serializes for a failed call.
///
/// ```json
/// {
///   "code": "VOID_WINDOW_EXPIRED",
///   "message": "Void window expired for transaction ..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorResponse {
            code,
            message: message.into(),
        }
    }
}

/// Storage details are logged, not shown to the cashier.
impl From<&LedgerError> for ErrorResponse {
    fn from(err: &LedgerError) -> Self {
        let code = err.code();
        match err {
            LedgerError::Core(core) => ErrorResponse::new(code, core.to_string()),
            LedgerError::Db(DbError::NotFound { entity, id }) => {
                ErrorResponse::new(code, format!("{} not found: {}", entity, id))
            }
            LedgerError::Db(db) => {
                tracing::error!(error = %db, "Database operation failed");
                ErrorResponse::new(code, "Database operation failed")
            }
            LedgerError::Config(config) => {
                tracing::error!(error = %config, "Configuration error");
                ErrorResponse::new(code, "Cash register is misconfigured")
            }
        }
    }
}

impl From<LedgerError> for ErrorResponse {
    fn from(err: LedgerError) -> Self {
        ErrorResponse::from(&err)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_for_void_errors() {
        let err = LedgerError::from(CoreError::SessionStillOpen("t-1".into()));
        assert_eq!(err.code(), ErrorCode::SessionStillOpen);

        let err = LedgerError::from(CoreError::AlreadyVoided("t-1".into()));
        assert_eq!(err.code(), ErrorCode::AlreadyVoided);
    }

    #[test]
    fn test_error_response_serialization() {
        let err = LedgerError::from(CoreError::SessionAlreadyOpen {
            actor_id: "cashier-1".into(),
            session_id: None,
        });
        let json = serde_json::to_value(ErrorResponse::from(err)).unwrap();
        assert_eq!(json["code"], "SESSION_ALREADY_OPEN");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("already has an open cash session"));
    }

    #[test]
    fn test_db_details_are_hidden() {
        let err = LedgerError::from(DbError::QueryFailed("near \"SELEC\": syntax error".into()));
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, ErrorCode::DatabaseError);
        assert_eq!(response.message, "Database operation failed");
    }

    #[test]
    fn test_validation_converts() {
        let err = LedgerError::from(ValidationError::Required {
            field: "reason".into(),
        });
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_overflow_code() {
        let err = LedgerError::from(CoreError::AmountOverflow {
            operation: "calculated balance".into(),
        });
        assert_eq!(err.code(), ErrorCode::AmountOutOfRange);
        let json = serde_json::to_value(ErrorResponse::from(err)).unwrap();
        assert_eq!(json["code"], "AMOUNT_OUT_OF_RANGE");
    }
}
