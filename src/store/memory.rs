//! In-memory ticket store.
//!
//! A single lock guards the whole state, so `commit_purchase` is trivially
//! atomic: the version check, the event replacement and the purchase
//! insertion happen inside one critical section. Used by the test suite and
//! the demo binary, and suitable as a real backend for single-process
//! deployments.

use crate::store::{
    EventCatalogStore, PurchaseLedger, StoreError, StoreFuture, TicketStore, Version,
};
use crate::types::{Event, EventId, OrganizerId, Purchase, PurchaseId, TxSignature};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, (Event, Version)>,
    purchases: HashMap<PurchaseId, Purchase>,
    /// Purchase ids in commit order
    ledger_order: Vec<PurchaseId>,
    /// External signature uniqueness index
    signatures: HashMap<TxSignature, PurchaseId>,
}

/// Lock-guarded in-process implementation of [`TicketStore`]
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    state: RwLock<State>,
}

impl InMemoryTicketStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn checked_swap(
        state: &mut State,
        event: Event,
        expected: Version,
    ) -> Result<Version, StoreError> {
        let Some((stored, version)) = state.events.get_mut(&event.id) else {
            return Err(StoreError::EventNotFound(event.id));
        };
        if *version != expected {
            return Err(StoreError::Conflict {
                event_id: event.id,
                expected,
                actual: *version,
            });
        }
        *stored = event;
        *version = expected.next();
        Ok(*version)
    }
}

impl EventCatalogStore for InMemoryTicketStore {
    fn insert_event(&self, event: Event) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let mut state = self.write();
            let version = Version::default();
            state.events.insert(event.id, (event, version));
            Ok(version)
        })
    }

    fn load_event(&self, event_id: EventId) -> StoreFuture<'_, (Event, Version)> {
        Box::pin(async move {
            self.read()
                .events
                .get(&event_id)
                .cloned()
                .ok_or(StoreError::EventNotFound(event_id))
        })
    }

    fn update_event(&self, event: Event, expected: Version) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let mut state = self.write();
            Self::checked_swap(&mut state, event, expected)
        })
    }

    fn events_by_organizer(&self, organizer_id: OrganizerId) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut events: Vec<Event> = self
                .read()
                .events
                .values()
                .map(|(event, _)| event)
                .filter(|event| event.organizer_id == organizer_id)
                .cloned()
                .collect();
            events.sort_by_key(|event| (event.starts_at, *event.id.as_uuid()));
            Ok(events)
        })
    }

    fn published_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut events: Vec<Event> = self
                .read()
                .events
                .values()
                .map(|(event, _)| event)
                .filter(|event| event.status == crate::types::EventStatus::Published)
                .cloned()
                .collect();
            events.sort_by_key(|event| (event.starts_at, *event.id.as_uuid()));
            Ok(events)
        })
    }
}

impl PurchaseLedger for InMemoryTicketStore {
    fn load_purchase(&self, purchase_id: PurchaseId) -> StoreFuture<'_, Purchase> {
        Box::pin(async move {
            self.read()
                .purchases
                .get(&purchase_id)
                .cloned()
                .ok_or(StoreError::PurchaseNotFound(purchase_id))
        })
    }

    fn purchases_for_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Purchase>> {
        Box::pin(async move {
            let state = self.read();
            Ok(state
                .ledger_order
                .iter()
                .filter_map(|id| state.purchases.get(id))
                .filter(|purchase| purchase.event_id == event_id)
                .cloned()
                .collect())
        })
    }
}

impl TicketStore for InMemoryTicketStore {
    fn commit_purchase(
        &self,
        event: Event,
        expected: Version,
        purchase: Purchase,
    ) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let mut state = self.write();

            // Reject a replayed external confirmation before touching anything.
            if let Some(signature) = &purchase.signature {
                if state.signatures.contains_key(signature) {
                    return Err(StoreError::DuplicateSignature(signature.clone()));
                }
            }

            let version = Self::checked_swap(&mut state, event, expected)?;

            if let Some(signature) = &purchase.signature {
                state.signatures.insert(signature.clone(), purchase.id);
            }
            state.ledger_order.push(purchase.id);
            state.purchases.insert(purchase.id, purchase);
            Ok(version)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        EventStatus, LocationKind, Money, PurchaseStatus, TierId, WalletAddress,
    };
    use chrono::Utc;

    fn sample_event() -> Event {
        Event {
            id: EventId::new(),
            organizer_id: OrganizerId::new(),
            title: "Sample".to_string(),
            description: "desc".to_string(),
            category: "music".to_string(),
            location_kind: LocationKind::Virtual,
            location: "https://example.com".to_string(),
            banner_ref: None,
            status: EventStatus::Published,
            starts_at: Utc::now(),
            ends_at: None,
            tiers: Vec::new(),
            total_capacity: 0,
            total_tickets_sold: 0,
            total_revenue: Money::ZERO,
            total_royalties_earned: Money::ZERO,
            total_attendees_checked_in: 0,
            created_at: Utc::now(),
        }
    }

    fn sample_purchase(event_id: EventId, signature: Option<TxSignature>) -> Purchase {
        Purchase {
            id: PurchaseId::new(),
            event_id,
            tier_id: TierId::new(),
            buyer: WalletAddress::new("wallet-1"),
            quantity: 1,
            price_per_unit: Money::from_dollars(10),
            total_price: Money::from_dollars(10),
            status: PurchaseStatus::Completed,
            signature,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = InMemoryTicketStore::new();
        let event = sample_event();
        let v0 = store.insert_event(event.clone()).await.unwrap();

        let v1 = store.update_event(event.clone(), v0).await.unwrap();
        assert_eq!(v1, v0.next());

        let error = store.update_event(event, v0).await.unwrap_err();
        assert!(matches!(
            error,
            StoreError::Conflict { expected, actual, .. }
                if expected == v0 && actual == v1
        ));
    }

    #[tokio::test]
    async fn commit_purchase_rejects_duplicate_signature_without_effect() {
        let store = InMemoryTicketStore::new();
        let event = sample_event();
        let v0 = store.insert_event(event.clone()).await.unwrap();

        let signature = TxSignature::new("sig-abc");
        let first = sample_purchase(event.id, Some(signature.clone()));
        let v1 = store
            .commit_purchase(event.clone(), v0, first)
            .await
            .unwrap();

        let second = sample_purchase(event.id, Some(signature));
        let error = store
            .commit_purchase(event.clone(), v1, second)
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::DuplicateSignature(_)));

        // The failed commit must not have advanced the version.
        let (_, version) = store.load_event(event.id).await.unwrap();
        assert_eq!(version, v1);
        assert_eq!(store.purchases_for_event(event.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purchases_are_listed_in_commit_order() {
        let store = InMemoryTicketStore::new();
        let event = sample_event();
        let mut version = store.insert_event(event.clone()).await.unwrap();

        let mut expected_ids = Vec::new();
        for _ in 0..3 {
            let purchase = sample_purchase(event.id, None);
            expected_ids.push(purchase.id);
            version = store
                .commit_purchase(event.clone(), version, purchase)
                .await
                .unwrap();
        }

        let listed: Vec<PurchaseId> = store
            .purchases_for_event(event.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(listed, expected_ids);
    }

    #[tokio::test]
    async fn published_events_are_sorted_by_start() {
        let store = InMemoryTicketStore::new();
        let mut early = sample_event();
        early.starts_at = Utc::now();
        let mut late = sample_event();
        late.starts_at = early.starts_at + chrono::Duration::days(3);
        let mut draft = sample_event();
        draft.status = EventStatus::Draft;

        store.insert_event(late.clone()).await.unwrap();
        store.insert_event(draft).await.unwrap();
        store.insert_event(early.clone()).await.unwrap();

        let published = store.published_events().await.unwrap();
        let ids: Vec<EventId> = published.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
