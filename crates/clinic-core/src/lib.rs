//! # clinic-core: Pure Business Logic for the Clinic Cash Register
//!
//! This crate is the **heart** of the cash register ledger. It contains the
//! domain vocabulary and every business rule that can be expressed without
//! touching storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Clinic Cash Register Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Clinic HTTP layer (controllers, permissions)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                clinic-ledger (services)                         │   │
//! │  │   SessionManager, TransactionLedger, AuditTrail, Payments       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ clinic-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   audit   │  │   rules   │  │   │
//! │  │   │CashSession│  │   Money   │  │AuditEvent │  │ void      │  │   │
//! │  │   │Transaction│  │           │  │AuditSubj. │  │ window    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   clinic-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CashSession, Transaction, statuses, methods)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`audit`] - Audit subjects, events and entries
//! - [`actor`] - The opaque `Actor` identity and capability names
//! - [`clock`] - Time source seam (system clock, manual clock for tests)
//! - [`rules`] - Void window and closing arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use clinic_core::money::Money;
//!
//! let opening = Money::from_major(100_000);
//! let balance = opening + Money::from_major(50_000) - Money::from_major(20_000);
//! assert_eq!(balance, Money::from_major(130_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod actor;
pub mod audit;
pub mod clock;
pub mod error;
pub mod money;
pub mod rules;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use actor::{ensure_capability, Actor, Capability, StaticActor};
pub use audit::{
    AuditEntry, AuditEvent, AuditQuery, AuditSearchField, AuditSubject, SessionEvent, SubjectKind,
    TransactionEvent,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// How long after a session closes its transactions may still be voided.
///
/// Configurable per deployment through the ledger configuration; this is
/// the value the clinic runs with.
pub const DEFAULT_VOID_WINDOW_HOURS: i64 = 24;

/// Largest single amount (opening balance, counted cash, transaction).
///
/// Keeps every balance sum well inside `i64` cents.
pub const MAX_AMOUNT: Money = Money::from_major(10_000_000_000);

/// Upper bound for free-text fields (notes, reasons, descriptions).
pub const MAX_TEXT_LENGTH: usize = 1000;

/// Default page size for audit history queries.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
