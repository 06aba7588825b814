//! # Actor
//!
//! The cash register never manages users. It receives an opaque actor from
//! the calling layer and reads two things from it: a stable identifier and
//! whether it holds a named capability.
//!
//! ## Who Checks What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP controller                                                        │
//! │    ensure_capability(actor, Capability::VoidTransactions)?  ◄── here   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  TransactionLedger::void(..)   ◄── no capability checks inside         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Identity handed in by the calling layer.
pub trait Actor: Send + Sync {
    /// Stable identifier recorded on sessions, transactions and audit entries.
    fn id(&self) -> &str;

    /// Whether the actor holds the named capability.
    fn has_capability(&self, capability: &str) -> bool;
}

/// Capabilities the calling layer gates cash register operations with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Capability {
    /// Close another cashier's session.
    #[serde(rename = "cash_register.force_close")]
    ForceClose,
    /// Void transactions of closed sessions.
    #[serde(rename = "transactions.void")]
    VoidTransactions,
    /// See every cashier's sessions, not only one's own.
    #[serde(rename = "cash_register.view_all")]
    ViewAll,
}

impl Capability {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::ForceClose => "cash_register.force_close",
            Capability::VoidTransactions => "transactions.void",
            Capability::ViewAll => "cash_register.view_all",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fails with `MissingCapability` unless the actor holds `capability`.
pub fn ensure_capability(actor: &dyn Actor, capability: Capability) -> CoreResult<()> {
    if actor.has_capability(capability.as_str()) {
        Ok(())
    } else {
        Err(CoreError::MissingCapability {
            actor_id: actor.id().to_string(),
            capability: capability.as_str().to_string(),
        })
    }
}

/// Plain actor with a fixed capability set.
///
/// Used by the seed binary and tests; the HTTP layer brings its own
/// `Actor` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticActor {
    id: String,
    capabilities: HashSet<String>,
}

impl StaticActor {
    pub fn new(id: impl Into<String>) -> Self {
        StaticActor {
            id: id.into(),
            capabilities: HashSet::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability.as_str().to_string());
        self
    }

    /// An actor holding every capability (administrator).
    pub fn admin(id: impl Into<String>) -> Self {
        StaticActor::new(id)
            .with_capability(Capability::ForceClose)
            .with_capability(Capability::VoidTransactions)
            .with_capability(Capability::ViewAll)
    }
}

impl Actor for StaticActor {
    fn id(&self) -> &str {
        &self.id
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
