//! Box Office - a ticket inventory and purchase transaction engine
//!
//! Manages the full lifecycle of token-gated event tickets: organizers
//! define events with priced ticket tiers, buyers purchase tickets against
//! finite per-tier supply, and organizers read live sales metrics. The
//! engine's core guarantee is that no tier ever oversells, no matter how
//! many purchases race.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌──────────────────────┐
//! │ EventCatalog │   │ PurchaseCoordinator │   │ DashboardAggregator  │
//! │ (lifecycle)  │   │ (atomic purchases)  │   │ (read-only metrics)  │
//! └──────┬───────┘   └──────────┬──────────┘   └──────────┬───────────┘
//!        │                      │                         │
//!        └──────────────────────┴─────────────────────────┘
//!                               │
//!                     ┌─────────▼─────────┐
//!                     │    TicketStore    │  versioned aggregates,
//!                     │ (memory/postgres) │  compare-and-swap writes
//!                     └───────────────────┘
//! ```
//!
//! # Concurrency Model
//!
//! Every `Event` and its tiers form one versioned aggregate. Writers load
//! the aggregate with its version, mutate a copy, and commit with a
//! compare-and-swap keyed on that version; a conflict means another writer
//! committed first, and the loser reloads and retries. `commit_purchase`
//! additionally inserts the purchase record in the same atomic unit, so a
//! sold ticket and its ledger entry can never diverge.
//!
//! # Example
//!
//! ```no_run
//! use boxoffice::catalog::EventCatalog;
//! use boxoffice::coordinator::PurchaseCoordinator;
//! use boxoffice::environment::SystemClock;
//! use boxoffice::store::memory::InMemoryTicketStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryTicketStore::new());
//! let clock = Arc::new(SystemClock);
//! let catalog = EventCatalog::new(store.clone(), clock.clone());
//! let coordinator = PurchaseCoordinator::new(store, clock);
//! ```

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod environment;
pub mod error;
pub mod store;
pub mod types;

pub use catalog::EventCatalog;
pub use config::Config;
pub use coordinator::PurchaseCoordinator;
pub use dashboard::{DashboardAggregator, DashboardSummary};
pub use environment::{Clock, FixedClock, SystemClock};
pub use error::{CatalogError, LedgerError, PurchaseError, ValidationError};
pub use store::{EventCatalogStore, PurchaseLedger, StoreError, TicketStore, Version};
pub use types::{
    Event, EventId, EventInput, EventPatch, EventStatus, Money, OrganizerId, Purchase,
    PurchaseId, PurchaseRequest, PurchaseStatus, TicketTier, TierId, TierInput, TxSignature,
    WalletAddress,
};
