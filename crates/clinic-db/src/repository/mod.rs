//! # Repository Module
//!
//! Database repository implementations for the cash register.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  clinic-ledger service                                                 │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin_write().await?;                         │
//! │       │  SessionRepository::close(tx.conn(), &closed).await?;          │
//! │       │  AuditRepository::insert(tx.conn(), &entry).await?;            │
//! │       │  tx.commit().await?;                                           │
//! │       ▼                                                                 │
//! │  Repositories (stateless, connection passed in)                        │
//! │  ├── SessionRepository      cash_sessions                              │
//! │  ├── TransactionRepository  transactions                               │
//! │  └── AuditRepository        audit_entries                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories take the connection instead of holding the pool so several
//! of them can share one write transaction.

pub mod audit;
pub mod session;
pub mod transaction;
