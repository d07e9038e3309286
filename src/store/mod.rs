//! Storage abstraction for the event catalog and the purchase ledger.
//!
//! The engine never performs an unguarded read-then-write: an `Event` and
//! its tiers form one versioned aggregate, and every mutation is a
//! compare-and-swap keyed on [`Version`]. Exclusivity is therefore enforced
//! by the persistence layer itself, so multiple service instances can run
//! against the same backend without losing updates.
//!
//! # Implementations
//!
//! - [`memory::InMemoryTicketStore`]: lock-guarded in-process backend
//! - [`postgres::PostgresTicketStore`]: durable backend (guarded `UPDATE`
//!   plus `INSERT` in one transaction)
//!
//! # Dyn Compatibility
//!
//! The traits use explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so they can be used as trait objects
//! (`Arc<dyn TicketStore>`).

pub mod memory;
pub mod postgres;

use crate::types::{Event, EventId, OrganizerId, Purchase, PurchaseId, TxSignature};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by the dyn-compatible store traits
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Aggregate version number for optimistic concurrency control.
///
/// Versions start at 0 when an event is inserted and increment by 1 for
/// each committed mutation. A writer states the version it read; if the
/// stored version no longer matches, the write fails with
/// [`StoreError::Conflict`] and the writer must reload and retry.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// Creates a `Version` from a raw number
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw version number
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the next version
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during store operations
#[derive(Clone, Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency conflict: expected version doesn't match the
    /// stored version. Another writer committed first; reload and retry.
    #[error("concurrency conflict on event {event_id}: expected version {expected}, found {actual}")]
    Conflict {
        /// The event where the conflict occurred
        event_id: EventId,
        /// The version the writer expected
        expected: Version,
        /// The version actually stored
        actual: Version,
    },

    /// No event with the given id exists
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// No purchase with the given id exists
    #[error("purchase not found: {0}")]
    PurchaseNotFound(PurchaseId),

    /// A purchase carrying this external signature is already recorded
    #[error("duplicate external signature: {0}")]
    DuplicateSignature(TxSignature),

    /// The backend is unavailable or a query failed. Nothing was committed;
    /// the operation is safe to retry.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Owns `Event` records and their versions.
///
/// All mutations go through compare-and-swap: `update_event` only succeeds
/// when `expected` matches the stored version.
pub trait EventCatalogStore: Send + Sync {
    /// Insert a newly created event at version 0.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage layer failed
    fn insert_event(&self, event: Event) -> StoreFuture<'_, Version>;

    /// Load an event together with its current version.
    ///
    /// # Errors
    ///
    /// - `EventNotFound`: no such event
    /// - `Backend`: the storage layer failed
    fn load_event(&self, event_id: EventId) -> StoreFuture<'_, (Event, Version)>;

    /// Replace an event's stored state, guarded by `expected`.
    ///
    /// Returns the new version on success.
    ///
    /// # Errors
    ///
    /// - `Conflict`: another writer committed since `expected` was read
    /// - `EventNotFound`: no such event
    /// - `Backend`: the storage layer failed
    fn update_event(&self, event: Event, expected: Version) -> StoreFuture<'_, Version>;

    /// List every event owned by the given organizer.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage layer failed
    fn events_by_organizer(&self, organizer_id: OrganizerId) -> StoreFuture<'_, Vec<Event>>;

    /// List every published event, ordered by start instant ascending.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage layer failed
    fn published_events(&self) -> StoreFuture<'_, Vec<Event>>;
}

/// Append-mostly store of `Purchase` records
pub trait PurchaseLedger: Send + Sync {
    /// Load a purchase by id.
    ///
    /// # Errors
    ///
    /// - `PurchaseNotFound`: no such purchase
    /// - `Backend`: the storage layer failed
    fn load_purchase(&self, purchase_id: PurchaseId) -> StoreFuture<'_, Purchase>;

    /// List every purchase recorded against an event, in commit order.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage layer failed
    fn purchases_for_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Purchase>>;
}

/// Combined store used by the purchase coordinator.
///
/// `commit_purchase` is the engine's one cross-store operation: the event
/// mutation and the purchase insertion succeed or fail as a single atomic
/// unit, so no reader can ever observe one without the other.
pub trait TicketStore: EventCatalogStore + PurchaseLedger {
    /// Atomically replace the event (guarded by `expected`) and insert the
    /// purchase.
    ///
    /// Enforces global uniqueness of the purchase's external signature.
    /// Returns the event's new version.
    ///
    /// # Errors
    ///
    /// - `Conflict`: another writer committed since `expected` was read;
    ///   nothing was written
    /// - `DuplicateSignature`: a purchase with this signature already
    ///   exists; nothing was written
    /// - `EventNotFound`: no such event
    /// - `Backend`: the storage layer failed; nothing was committed
    fn commit_purchase(
        &self,
        event: Event,
        expected: Version,
        purchase: Purchase,
    ) -> StoreFuture<'_, Version>;
}
