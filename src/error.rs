//! Error taxonomy for the ticket engine.
//!
//! Validation failures are aggregated: event creation and update report
//! every violated field in one [`ValidationError`] instead of failing on the
//! first problem. The purchase path guarantees all-or-nothing effects for
//! every error kind below.

use crate::store::StoreError;
use crate::types::{EventId, EventStatus, PurchaseId, TierId, TxSignature};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single field-level validation problem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldProblem {
    /// The offending field (e.g. `"title"`, `"tiers[2].supply"`)
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldProblem {
    /// Creates a new `FieldProblem`
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Aggregated, caller-fixable validation failure carrying every violated
/// field
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("validation failed: {}", .problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    /// Every field-level problem found, in field order
    pub problems: Vec<FieldProblem>,
}

impl ValidationError {
    /// Creates a `ValidationError` from collected problems
    #[must_use]
    pub const fn new(problems: Vec<FieldProblem>) -> Self {
        Self { problems }
    }
}

/// Errors returned by the event catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// One or more input fields are invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No event with the given id exists
    #[error("event not found: {0}")]
    NotFound(EventId),

    /// The storage layer failed
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::EventNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Errors returned by the purchase transaction coordinator.
///
/// Every variant guarantees that no counters changed and no purchase became
/// visible.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The request itself is malformed (quantity, buyer)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No event with the given id exists
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The event has no tier with the given id
    #[error("tier not found: {0}")]
    TierNotFound(TierId),

    /// The event is not accepting purchases in its current status
    #[error("event is {0}, not published")]
    InvalidState(EventStatus),

    /// Purchases closed at the given instant
    #[error("sales closed at {closed_at}")]
    Expired {
        /// When purchases stopped being accepted
        closed_at: DateTime<Utc>,
    },

    /// The requested quantity exceeds the tier's remaining supply
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        /// Tickets requested
        requested: u32,
        /// Tickets remaining when the request was evaluated
        available: u32,
    },

    /// A purchase carrying this external signature already exists
    #[error("duplicate external signature: {0}")]
    DuplicateSignature(TxSignature),

    /// The commit lost the optimistic-concurrency race too many times.
    ///
    /// Nothing was committed; the caller may safely retry.
    #[error("purchase conflicted with concurrent commits after {attempts} attempts")]
    ConflictRetryable {
        /// How many commit attempts were made
        attempts: u32,
    },

    /// The storage layer failed; nothing was committed, safe to retry
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PurchaseError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::EventNotFound(id) => Self::EventNotFound(id),
            StoreError::DuplicateSignature(signature) => Self::DuplicateSignature(signature),
            other => Self::Store(other),
        }
    }
}

/// Errors returned when reading purchase records
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No purchase with the given id exists
    #[error("purchase not found: {0}")]
    NotFound(PurchaseId),

    /// The storage layer failed
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::PurchaseNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_problem() {
        let error = ValidationError::new(vec![
            FieldProblem::new("title", "must not be empty"),
            FieldProblem::new("tiers", "at least one tier is required"),
        ]);
        let display = error.to_string();
        assert!(display.contains("title: must not be empty"));
        assert!(display.contains("tiers: at least one tier is required"));
    }

    #[test]
    fn store_not_found_maps_to_catalog_not_found() {
        let id = EventId::new();
        let error = CatalogError::from(StoreError::EventNotFound(id));
        assert!(matches!(error, CatalogError::NotFound(found) if found == id));
    }
}
