//! # clinic-db: Database Layer for the Clinic Cash Register
//!
//! This crate provides database access for the cash register ledger.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Register Data Flow                             │
//! │                                                                         │
//! │  SessionManager::close (clinic-ledger)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    clinic-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌───────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations   │ │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)   │ │   │
//! │  │   │               │    │ SessionRepo    │   │               │ │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo│   │ 001_cash_     │ │   │
//! │  │   │ Write gate    │    │ AuditRepo      │   │  register.sql │ │   │
//! │  │   └───────────────┘    └────────────────┘   └───────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/cash_register.db                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and the write unit of work
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (session, transaction, audit)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clinic_db::{Database, DbConfig, SessionRepository};
//!
//! let db = Database::new(DbConfig::new("cash_register.db")).await?;
//!
//! let mut conn = db.acquire().await?;
//! let open = SessionRepository::find_open_for_actor(&mut conn, "cashier-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, WriteTx};

// Repository re-exports for convenience
pub use repository::audit::{generate_audit_id, AuditRepository};
pub use repository::session::{generate_session_id, SessionRepository};
pub use repository::transaction::{generate_transaction_id, TransactionRepository};
