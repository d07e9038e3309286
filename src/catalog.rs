//! Event catalog: creation, updates, and catalog reads.
//!
//! The catalog exclusively owns `Event`/`TicketTier` mutation outside the
//! purchase path. Validation is aggregated: every violated field is
//! reported in one [`ValidationError`] rather than failing on the first.
//!
//! Tier replacement matches tiers by name and carries the sale counters
//! (and the stable tier id) forward, so an organizer edit can never erase
//! sold tickets or re-key a tier that purchases already reference.

use crate::environment::Clock;
use crate::error::{CatalogError, FieldProblem, ValidationError};
use crate::store::{EventCatalogStore, StoreError, TicketStore};
use crate::types::{
    Event, EventId, EventInput, EventPatch, EventStatus, Money, OrganizerId, TicketTier, TierId,
    TierInput, MAX_ROYALTY_PERCENT,
};
use std::sync::Arc;

/// How many times an update retries its compare-and-swap before giving up.
///
/// The event version only advances on committed writes (purchases or other
/// updates), so retries are rare and short-lived.
const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Service owning event creation, updates and catalog reads
pub struct EventCatalog {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl EventCatalog {
    /// Creates a new `EventCatalog`
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a new event in `Draft` with zeroed counters.
    ///
    /// `total_capacity` is set to the sum of tier supplies and every tier
    /// gets a fresh stable id.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Validation`]: one or more fields are invalid; the
    ///   error lists all of them
    /// - [`CatalogError::Store`]: the storage layer failed
    #[tracing::instrument(skip(self, input), fields(organizer = %input.organizer_id))]
    pub async fn create(&self, input: EventInput) -> Result<Event, CatalogError> {
        let mut problems = validate_scalars(
            &input.title,
            &input.description,
            &input.category,
            &input.location,
        );
        if let Some(ends_at) = input.ends_at {
            if ends_at < input.starts_at {
                problems.push(FieldProblem::new(
                    "ends_at",
                    "end must not precede start",
                ));
            }
        }
        if input.tiers.is_empty() {
            problems.push(FieldProblem::new("tiers", "at least one tier is required"));
        }
        problems.extend(validate_tier_inputs(&input.tiers));
        let Some(total_capacity) = checked_capacity(input.tiers.iter().map(|t| t.supply)) else {
            problems.push(FieldProblem::new("tiers", "combined tier supply overflows"));
            return Err(ValidationError::new(problems).into());
        };
        if !problems.is_empty() {
            return Err(ValidationError::new(problems).into());
        }

        let tiers: Vec<TicketTier> = input.tiers.iter().map(fresh_tier).collect();
        let event = Event {
            id: EventId::new(),
            organizer_id: input.organizer_id,
            title: input.title,
            description: input.description,
            category: input.category,
            location_kind: input.location_kind,
            location: input.location,
            banner_ref: input.banner_ref,
            status: EventStatus::Draft,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            tiers,
            total_capacity,
            total_tickets_sold: 0,
            total_revenue: Money::ZERO,
            total_royalties_earned: Money::ZERO,
            total_attendees_checked_in: 0,
            created_at: self.clock.now(),
        };

        self.store.insert_event(event.clone()).await?;
        tracing::info!(event_id = %event.id, capacity = event.total_capacity, "event created");
        Ok(event)
    }

    /// Applies a patch to an event.
    ///
    /// Provided scalar fields are merged; a provided tier list replaces the
    /// existing one, matching tiers by name to carry forward their id,
    /// `tickets_sold`, `revenue` and purchase list. `total_capacity`,
    /// `total_tickets_sold` and `total_revenue` are recomputed from the
    /// merged tiers. The write is a compare-and-swap retried a bounded
    /// number of times, so a concurrent purchase commit does not fail the
    /// update.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: no such event
    /// - [`CatalogError::Validation`]: invalid patch fields, including a
    ///   replacement tier supply below the tickets already sold for that
    ///   tier
    /// - [`CatalogError::Store`]: storage failure, or contention beyond the
    ///   retry bound
    #[tracing::instrument(skip(self, patch), fields(event_id = %event_id))]
    pub async fn update(&self, event_id: EventId, patch: EventPatch) -> Result<Event, CatalogError> {
        let mut attempts = 0;
        loop {
            let (event, version) = self.store.load_event(event_id).await?;
            let patched = apply_patch(event, &patch)?;
            match self.store.update_event(patched.clone(), version).await {
                Ok(_) => {
                    tracing::info!(version = %version.next(), "event updated");
                    return Ok(patched);
                }
                Err(StoreError::Conflict { .. }) if attempts + 1 < MAX_UPDATE_ATTEMPTS => {
                    attempts += 1;
                    tracing::debug!(attempts, "update lost the version race, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Loads an event by id.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`]: no such event
    /// - [`CatalogError::Store`]: the storage layer failed
    pub async fn get(&self, event_id: EventId) -> Result<Event, CatalogError> {
        let (event, _) = self.store.load_event(event_id).await?;
        Ok(event)
    }

    /// Lists every event owned by an organizer.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Store`]: the storage layer failed
    pub async fn list_by_owner(&self, organizer_id: OrganizerId) -> Result<Vec<Event>, CatalogError> {
        Ok(self.store.events_by_organizer(organizer_id).await?)
    }

    /// Lists every published event, ordered by start instant ascending.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Store`]: the storage layer failed
    pub async fn list_published(&self) -> Result<Vec<Event>, CatalogError> {
        Ok(self.store.published_events().await?)
    }
}

fn validate_scalars(
    title: &str,
    description: &str,
    category: &str,
    location: &str,
) -> Vec<FieldProblem> {
    let mut problems = Vec::new();
    for (field, value) in [
        ("title", title),
        ("description", description),
        ("category", category),
        ("location", location),
    ] {
        if value.trim().is_empty() {
            problems.push(FieldProblem::new(field, "must not be empty"));
        }
    }
    problems
}

fn validate_tier_inputs(tiers: &[TierInput]) -> Vec<FieldProblem> {
    let mut problems = Vec::new();
    for (index, tier) in tiers.iter().enumerate() {
        if tier.name.trim().is_empty() {
            problems.push(FieldProblem::new(
                format!("tiers[{index}].name"),
                "must not be empty",
            ));
        }
        if tier.supply == 0 {
            problems.push(FieldProblem::new(
                format!("tiers[{index}].supply"),
                "must be at least 1",
            ));
        }
        if tier.royalty_percent > MAX_ROYALTY_PERCENT {
            problems.push(FieldProblem::new(
                format!("tiers[{index}].royalty_percent"),
                format!("must be at most {MAX_ROYALTY_PERCENT}"),
            ));
        }
        if tiers[..index].iter().any(|other| other.name == tier.name) {
            problems.push(FieldProblem::new(
                format!("tiers[{index}].name"),
                format!("duplicate tier name '{}'", tier.name),
            ));
        }
    }
    problems
}

/// Sums tier supplies, refusing a total that does not fit `u32`
fn checked_capacity<I: Iterator<Item = u32>>(supplies: I) -> Option<u32> {
    supplies.into_iter().try_fold(0u32, u32::checked_add)
}

fn fresh_tier(input: &TierInput) -> TicketTier {
    TicketTier {
        id: TierId::new(),
        name: input.name.clone(),
        price: input.price,
        supply: input.supply,
        tickets_sold: 0,
        revenue: Money::ZERO,
        royalty_percent: input.royalty_percent,
        resale_allowed: input.resale_allowed,
        purchase_ids: Vec::new(),
    }
}

/// Replaces a tier list, matching replacement tiers by name against the
/// existing list. Matched tiers keep their id and sale counters; unmatched
/// tiers start from zero.
pub(crate) fn merge_tiers(existing: &[TicketTier], inputs: &[TierInput]) -> Vec<TicketTier> {
    inputs
        .iter()
        .map(|input| {
            existing
                .iter()
                .find(|tier| tier.name == input.name)
                .map_or_else(
                    || fresh_tier(input),
                    |matched| TicketTier {
                        id: matched.id,
                        name: input.name.clone(),
                        price: input.price,
                        supply: input.supply,
                        tickets_sold: matched.tickets_sold,
                        revenue: matched.revenue,
                        royalty_percent: input.royalty_percent,
                        resale_allowed: input.resale_allowed,
                        purchase_ids: matched.purchase_ids.clone(),
                    },
                )
        })
        .collect()
}

fn apply_patch(mut event: Event, patch: &EventPatch) -> Result<Event, CatalogError> {
    if let Some(title) = &patch.title {
        event.title = title.clone();
    }
    if let Some(description) = &patch.description {
        event.description = description.clone();
    }
    if let Some(category) = &patch.category {
        event.category = category.clone();
    }
    if let Some(location_kind) = patch.location_kind {
        event.location_kind = location_kind;
    }
    if let Some(location) = &patch.location {
        event.location = location.clone();
    }
    if let Some(banner_ref) = &patch.banner_ref {
        event.banner_ref = Some(banner_ref.clone());
    }
    if let Some(status) = patch.status {
        event.status = status;
    }
    if let Some(starts_at) = patch.starts_at {
        event.starts_at = starts_at;
    }
    if let Some(ends_at) = patch.ends_at {
        event.ends_at = Some(ends_at);
    }

    let mut problems = validate_scalars(
        &event.title,
        &event.description,
        &event.category,
        &event.location,
    );
    if let Some(ends_at) = event.ends_at {
        if ends_at < event.starts_at {
            problems.push(FieldProblem::new("ends_at", "end must not precede start"));
        }
    }

    if let Some(inputs) = &patch.tiers {
        if inputs.is_empty() {
            problems.push(FieldProblem::new("tiers", "at least one tier is required"));
        }
        problems.extend(validate_tier_inputs(inputs));

        let merged = merge_tiers(&event.tiers, inputs);
        for (index, tier) in merged.iter().enumerate() {
            if tier.supply < tier.tickets_sold {
                problems.push(FieldProblem::new(
                    format!("tiers[{index}].supply"),
                    format!(
                        "supply {} is below the {} tickets already sold",
                        tier.supply, tier.tickets_sold
                    ),
                ));
            }
        }

        match checked_capacity(merged.iter().map(|t| t.supply)) {
            Some(capacity) if problems.is_empty() => {
                event.total_capacity = capacity;
                event.total_tickets_sold = merged.iter().map(|t| t.tickets_sold).sum();
                event.total_revenue = merged
                    .iter()
                    .fold(Money::ZERO, |sum, tier| sum.add(tier.revenue));
                event.tiers = merged;
            }
            Some(_) => {}
            None => {
                problems.push(FieldProblem::new("tiers", "combined tier supply overflows"));
            }
        }
    }

    if problems.is_empty() {
        Ok(event)
    } else {
        Err(ValidationError::new(problems).into())
    }
}
