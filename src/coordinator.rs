//! Purchase transaction coordinator.
//!
//! The one writer of tier sale counters and the only creator of `Purchase`
//! records. A purchase is a load → validate → mutate-a-copy →
//! compare-and-swap cycle: nothing is written until [`TicketStore::commit_purchase`]
//! atomically replaces the event aggregate and inserts the purchase, so a
//! failure or cancellation at any earlier step leaves zero observable
//! effect.
//!
//! **Concurrency**: racing purchases against the same event serialize on
//! the event version. A loser reloads and retries; because the version only
//! advances when a purchase actually commits, a request can lose its swap
//! at most once per concurrently committed purchase, and the retry bound
//! only trips under pathological contention (surfaced as
//! [`PurchaseError::ConflictRetryable`], safe for the caller to retry).

use crate::environment::Clock;
use crate::error::{FieldProblem, LedgerError, PurchaseError, ValidationError};
use crate::store::{EventCatalogStore, PurchaseLedger, StoreError, TicketStore};
use crate::types::{
    Event, EventId, EventStatus, Purchase, PurchaseId, PurchaseRequest, PurchaseStatus,
};
use std::sync::Arc;

/// How many commit attempts a purchase makes before surfacing
/// [`PurchaseError::ConflictRetryable`]
pub const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Coordinates atomic ticket purchases against the catalog and the ledger
pub struct PurchaseCoordinator {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    max_commit_attempts: u32,
}

impl PurchaseCoordinator {
    /// Creates a new `PurchaseCoordinator` with the default retry bound
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_commit_attempts: MAX_COMMIT_ATTEMPTS,
        }
    }

    /// Overrides the commit retry bound, clamped to at least one attempt
    /// (see [`crate::config::PurchaseConfig`])
    #[must_use]
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Purchases tickets, succeeding or failing with no partial effect.
    ///
    /// On success the returned purchase is `Completed` and the event's tier
    /// and aggregate counters reflect it; both were committed as one atomic
    /// unit.
    ///
    /// # Errors
    ///
    /// - [`PurchaseError::Validation`]: zero quantity or empty buyer wallet
    /// - [`PurchaseError::EventNotFound`] / [`PurchaseError::TierNotFound`]
    /// - [`PurchaseError::InvalidState`]: event is not published
    /// - [`PurchaseError::Expired`]: past the event's close of sales
    /// - [`PurchaseError::InsufficientInventory`]: fewer tickets remain
    ///   than requested
    /// - [`PurchaseError::DuplicateSignature`]: the external signature was
    ///   already used by another purchase
    /// - [`PurchaseError::ConflictRetryable`]: lost the optimistic race too
    ///   many times; nothing committed, safe to retry
    /// - [`PurchaseError::Store`]: storage failure; nothing committed
    #[tracing::instrument(
        skip(self, request),
        fields(event_id = %request.event_id, tier_id = %request.tier_id, quantity = request.quantity)
    )]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Purchase, PurchaseError> {
        validate_request(&request)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let (event, version) = self.store.load_event(request.event_id).await?;
            let (event, purchase) = self.prepare(event, &request)?;

            match self
                .store
                .commit_purchase(event, version, purchase.clone())
                .await
            {
                Ok(version) => {
                    tracing::info!(
                        purchase_id = %purchase.id,
                        total = %purchase.total_price,
                        %version,
                        "purchase committed"
                    );
                    return Ok(purchase);
                }
                Err(StoreError::Conflict { .. }) if attempts < self.max_commit_attempts => {
                    tracing::debug!(attempts, "purchase lost the version race, retrying");
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::warn!(attempts, "purchase exhausted its commit attempts");
                    return Err(PurchaseError::ConflictRetryable { attempts });
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Loads a purchase record by id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`]: no such purchase
    /// - [`LedgerError::Store`]: the storage layer failed
    pub async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Purchase, LedgerError> {
        Ok(self.store.load_purchase(purchase_id).await?)
    }

    /// Lists every purchase recorded against an event, in commit order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Store`]: the storage layer failed
    pub async fn purchases_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Purchase>, LedgerError> {
        Ok(self.store.purchases_for_event(event_id).await?)
    }

    /// Validates the request against the loaded event and produces the
    /// mutated aggregate plus the purchase record to commit.
    fn prepare(
        &self,
        mut event: Event,
        request: &PurchaseRequest,
    ) -> Result<(Event, Purchase), PurchaseError> {
        if event.status != EventStatus::Published {
            return Err(PurchaseError::InvalidState(event.status));
        }

        let now = self.clock.now();
        if event.sales_closed(now) {
            return Err(PurchaseError::Expired {
                closed_at: event.sales_close_at(),
            });
        }

        let tier = event
            .tier(request.tier_id)
            .ok_or(PurchaseError::TierNotFound(request.tier_id))?;
        if !tier.has_availability(request.quantity) {
            return Err(PurchaseError::InsufficientInventory {
                requested: request.quantity,
                available: tier.available(),
            });
        }

        let price_per_unit = tier.price;
        let total_price = price_per_unit
            .checked_multiply(request.quantity)
            .ok_or_else(|| {
                ValidationError::new(vec![FieldProblem::new(
                    "quantity",
                    "total price overflows",
                )])
            })?;

        let purchase = Purchase {
            id: PurchaseId::new(),
            event_id: event.id,
            tier_id: request.tier_id,
            buyer: request.buyer.clone(),
            quantity: request.quantity,
            price_per_unit,
            total_price,
            status: PurchaseStatus::Completed,
            signature: request.signature.clone(),
            created_at: now,
        };

        apply_sale(&mut event, request.tier_id, &purchase);
        Ok((event, purchase))
    }
}

/// Applies a prepared sale to the aggregate copy: tier counters, the
/// tier's purchase list, and the event totals.
fn apply_sale(event: &mut Event, tier_id: crate::types::TierId, purchase: &Purchase) {
    if let Some(tier) = event.tier_mut(tier_id) {
        tier.tickets_sold += purchase.quantity;
        tier.revenue = tier.revenue.add(purchase.total_price);
        tier.purchase_ids.push(purchase.id);
    }
    event.total_tickets_sold += purchase.quantity;
    event.total_revenue = event.total_revenue.add(purchase.total_price);

    debug_assert!(tier_invariants_hold(event), "tier invariants violated");
}

fn tier_invariants_hold(event: &Event) -> bool {
    event.tiers.iter().all(|t| t.tickets_sold <= t.supply)
        && event.total_tickets_sold <= event.total_capacity
}

fn validate_request(request: &PurchaseRequest) -> Result<(), ValidationError> {
    let mut problems = Vec::new();
    if request.quantity == 0 {
        problems.push(FieldProblem::new("quantity", "must be at least 1"));
    }
    if request.buyer.is_empty() {
        problems.push(FieldProblem::new("buyer", "must not be empty"));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(problems))
    }
}
