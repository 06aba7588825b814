//! # clinic-ledger: Cash Register Services
//!
//! The services the clinic's HTTP controllers call in-process. Each
//! mutation is one SQLite write transaction that carries the state change
//! and its audit entry together.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     CashRegister::connect(config)                       │
//! │                                                                         │
//! │  1. LedgerConfig::load()        → defaults, TOML file, CLINIC_* env     │
//! │  2. Database::new(db_config)    → pool + pending migrations             │
//! │  3. AuditTrail                  → append-only log                       │
//! │  4. TransactionLedger           → record / void / aggregate             │
//! │  5. SessionManager              → open / close / force close            │
//! │  6. PaymentOrchestrator         → service and supplier payments         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use clinic_core::{Money, StaticActor};
//! use clinic_ledger::{CashRegister, LedgerConfig};
//!
//! # async fn run() -> clinic_ledger::LedgerResult<()> {
//! let register = CashRegister::connect(LedgerConfig::load(None)?).await?;
//! let cashier = StaticActor::new("cashier-1");
//!
//! let session = register
//!     .sessions()
//!     .open(&cashier, Money::from_major(100_000), None)
//!     .await?;
//! register
//!     .sessions()
//!     .close(&cashier, &session.id, Money::from_major(100_000), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;
pub mod payments;
pub mod session;

pub use audit::{AuditTrail, ResolvedSubject};
pub use config::{ConfigError, ConfigResult, DatabaseSettings, LedgerConfig, LedgerSettings};
pub use error::{ErrorCode, ErrorResponse, LedgerError, LedgerResult};
pub use ledger::TransactionLedger;
pub use payments::PaymentOrchestrator;
pub use session::SessionManager;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinic_core::{Clock, SystemClock};
use clinic_db::Database;

/// The four cash register services wired to one database and clock.
#[derive(Clone)]
pub struct CashRegister {
    db: Database,
    config: LedgerConfig,
    audit: AuditTrail,
    ledger: TransactionLedger,
    sessions: SessionManager,
    payments: PaymentOrchestrator,
}

impl CashRegister {
    /// Opens the configured database and builds the services.
    pub async fn connect(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Ok(Self::with_clock(db, config, Arc::new(SystemClock)))
    }

    /// Builds the services over an existing database and clock.
    pub fn with_clock(db: Database, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let audit = AuditTrail::new(db.clone(), clock.clone(), config.history_limit());
        let ledger = TransactionLedger::new(
            db.clone(),
            clock.clone(),
            audit.clone(),
            config.void_window_hours(),
        );
        let sessions = SessionManager::new(db.clone(), clock, audit.clone());
        let payments = PaymentOrchestrator::new(db.clone(), ledger.clone());

        info!(
            void_window_hours = config.void_window_hours(),
            history_limit = config.history_limit(),
            "Cash register ready"
        );

        CashRegister {
            db,
            config,
            audit,
            ledger,
            sessions,
            payments,
        }
    }

    /// A throwaway register on an in-memory database.
    pub async fn in_memory() -> LedgerResult<Self> {
        Self::connect(LedgerConfig::in_memory()).await
    }

    /// In-memory register driven by `clock`.
    pub async fn in_memory_with_clock(clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let config = LedgerConfig::in_memory();
        let db = Database::new(config.db_config()).await?;
        Ok(Self::with_clock(db, config, clock))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,clinic=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
