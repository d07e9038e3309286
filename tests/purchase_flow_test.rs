//! End-to-end flows through the public API: catalog lifecycle, purchases,
//! the ledger, and the organizer dashboard working against one store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use boxoffice::catalog::EventCatalog;
use boxoffice::coordinator::PurchaseCoordinator;
use boxoffice::dashboard::DashboardAggregator;
use boxoffice::environment::{test_clock, Clock};
use boxoffice::error::PurchaseError;
use boxoffice::store::memory::InMemoryTicketStore;
use boxoffice::types::{
    Event, EventInput, EventPatch, EventStatus, LocationKind, Money, OrganizerId,
    PurchaseRequest, PurchaseStatus, TierInput, TxSignature, WalletAddress,
};
use chrono::Duration;
use std::sync::Arc;

struct App {
    catalog: EventCatalog,
    coordinator: PurchaseCoordinator,
    dashboard: DashboardAggregator,
}

fn app() -> App {
    let store = Arc::new(InMemoryTicketStore::new());
    let clock = Arc::new(test_clock());
    App {
        catalog: EventCatalog::new(store.clone(), clock.clone()),
        coordinator: PurchaseCoordinator::new(store.clone(), clock.clone()),
        dashboard: DashboardAggregator::new(store, clock),
    }
}

fn two_tier_input(organizer_id: OrganizerId) -> EventInput {
    let now = test_clock().now();
    EventInput {
        organizer_id,
        title: "Synthwave Summit".to_string(),
        description: "Two stages, one night.".to_string(),
        category: "music".to_string(),
        location_kind: LocationKind::Physical,
        location: "Pier 42".to_string(),
        banner_ref: Some("banners/summit.png".to_string()),
        starts_at: now + Duration::days(14),
        ends_at: Some(now + Duration::days(14) + Duration::hours(8)),
        tiers: vec![
            TierInput {
                name: "VIP".to_string(),
                price: Money::from_dollars(150),
                supply: 10,
                royalty_percent: 10,
                resale_allowed: true,
            },
            TierInput {
                name: "General Admission".to_string(),
                price: Money::from_dollars(50),
                supply: 100,
                royalty_percent: 5,
                resale_allowed: true,
            },
        ],
    }
}

async fn publish(catalog: &EventCatalog, event: &Event) -> Event {
    catalog
        .update(
            event.id,
            EventPatch {
                status: Some(EventStatus::Published),
                ..EventPatch::default()
            },
        )
        .await
        .expect("publish")
}

#[tokio::test]
async fn create_purchase_and_read_back_through_the_ledger() {
    let app = app();
    let organizer_id = OrganizerId::new();
    let event = app.catalog.create(two_tier_input(organizer_id)).await.expect("create");
    assert_eq!(event.status, EventStatus::Draft);
    assert_eq!(event.total_capacity, 110);

    let event = publish(&app.catalog, &event).await;
    let vip = event.tiers[0].id;

    let purchase = app
        .coordinator
        .purchase(PurchaseRequest {
            event_id: event.id,
            tier_id: vip,
            buyer: WalletAddress::new("alice-wallet"),
            quantity: 2,
            signature: Some(TxSignature::new("sig-alice")),
        })
        .await
        .expect("purchase");

    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.quantity, 2);
    assert_eq!(purchase.total_price, Money::from_dollars(300));

    let reloaded = app.catalog.get(event.id).await.expect("reload");
    assert_eq!(reloaded.tiers[0].tickets_sold, 2);
    assert_eq!(reloaded.tiers[0].available(), 8);
    assert_eq!(reloaded.total_tickets_sold, 2);
    assert_eq!(reloaded.total_revenue, Money::from_dollars(300));

    let ledger = app
        .coordinator
        .purchases_for_event(event.id)
        .await
        .expect("ledger");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].id, purchase.id);
    assert_eq!(ledger[0].buyer, WalletAddress::new("alice-wallet"));

    let looked_up = app
        .coordinator
        .get_purchase(purchase.id)
        .await
        .expect("lookup");
    assert_eq!(looked_up.total_price, purchase.total_price);
}

#[tokio::test]
async fn purchase_against_a_draft_event_is_rejected() {
    let app = app();
    let event = app
        .catalog
        .create(two_tier_input(OrganizerId::new()))
        .await
        .expect("create");

    let error = app
        .coordinator
        .purchase(PurchaseRequest {
            event_id: event.id,
            tier_id: event.tiers[0].id,
            buyer: WalletAddress::new("bob-wallet"),
            quantity: 1,
            signature: None,
        })
        .await
        .expect_err("draft events must not sell");
    assert!(matches!(
        error,
        PurchaseError::InvalidState(EventStatus::Draft)
    ));
}

#[tokio::test]
async fn tier_replacement_keeps_sales_history() {
    let app = app();
    let organizer_id = OrganizerId::new();
    let event = app.catalog.create(two_tier_input(organizer_id)).await.expect("create");
    let event = publish(&app.catalog, &event).await;
    let vip = event.tiers[0].id;

    app.coordinator
        .purchase(PurchaseRequest {
            event_id: event.id,
            tier_id: vip,
            buyer: WalletAddress::new("carol-wallet"),
            quantity: 3,
            signature: None,
        })
        .await
        .expect("purchase");

    // Raise VIP supply and drop General Admission in one tier replacement.
    let updated = app
        .catalog
        .update(
            event.id,
            EventPatch {
                tiers: Some(vec![TierInput {
                    name: "VIP".to_string(),
                    price: Money::from_dollars(175),
                    supply: 20,
                    royalty_percent: 10,
                    resale_allowed: true,
                }]),
                ..EventPatch::default()
            },
        )
        .await
        .expect("tier replacement");

    assert_eq!(updated.tiers.len(), 1);
    let kept = &updated.tiers[0];
    assert_eq!(kept.id, vip, "a renamed supply keeps its identity");
    assert_eq!(kept.tickets_sold, 3);
    assert_eq!(kept.revenue, Money::from_dollars(450));
    assert_eq!(kept.price, Money::from_dollars(175));
    assert_eq!(updated.total_capacity, 20);
    assert_eq!(updated.total_tickets_sold, 3);

    // The new supply sells at the new price.
    let purchase = app
        .coordinator
        .purchase(PurchaseRequest {
            event_id: event.id,
            tier_id: vip,
            buyer: WalletAddress::new("dave-wallet"),
            quantity: 1,
            signature: None,
        })
        .await
        .expect("post-update purchase");
    assert_eq!(purchase.total_price, Money::from_dollars(175));
}

#[tokio::test]
async fn dashboard_reflects_committed_sales() {
    let app = app();
    let organizer_id = OrganizerId::new();
    let event = app.catalog.create(two_tier_input(organizer_id)).await.expect("create");
    let event = publish(&app.catalog, &event).await;
    let ga = event.tiers[1].id;

    for n in 0..5 {
        app.coordinator
            .purchase(PurchaseRequest {
                event_id: event.id,
                tier_id: ga,
                buyer: WalletAddress::new(format!("wallet-{n}")),
                quantity: 2,
                signature: Some(TxSignature::new(format!("sig-{n}"))),
            })
            .await
            .expect("purchase");
    }

    let summary = app.dashboard.summarize(organizer_id).await.expect("summary");
    assert_eq!(summary.total_tickets_sold, 10);
    assert_eq!(summary.total_revenue, Money::from_dollars(500));
    assert_eq!(summary.active_events, 1);
    assert_eq!(summary.top_events.len(), 1);
    assert_eq!(summary.top_events[0].event_id, event.id);
    assert_eq!(summary.upcoming_events.len(), 1);
    assert_eq!(summary.upcoming_events[0].days_remaining, 14);

    // 10 of 110 sold is under 20%, and the event hasn't started.
    assert_eq!(summary.issues.len(), 1);

    // Another organizer sees none of it.
    let other = app
        .dashboard
        .summarize(OrganizerId::new())
        .await
        .expect("summary");
    assert_eq!(other.total_tickets_sold, 0);
    assert!(other.top_events.is_empty());
}

#[tokio::test]
async fn replayed_signature_is_rejected_after_the_fact() {
    let app = app();
    let event = app
        .catalog
        .create(two_tier_input(OrganizerId::new()))
        .await
        .expect("create");
    let event = publish(&app.catalog, &event).await;
    let ga = event.tiers[1].id;

    let request = PurchaseRequest {
        event_id: event.id,
        tier_id: ga,
        buyer: WalletAddress::new("eve-wallet"),
        quantity: 1,
        signature: Some(TxSignature::new("sig-once")),
    };
    app.coordinator.purchase(request.clone()).await.expect("first purchase");

    let error = app
        .coordinator
        .purchase(request)
        .await
        .expect_err("replay must fail");
    assert!(matches!(error, PurchaseError::DuplicateSignature(_)));

    let reloaded = app.catalog.get(event.id).await.expect("reload");
    assert_eq!(reloaded.total_tickets_sold, 1, "replay had no effect");
}

#[tokio::test]
async fn cancelled_event_stops_selling() {
    let app = app();
    let event = app
        .catalog
        .create(two_tier_input(OrganizerId::new()))
        .await
        .expect("create");
    let event = publish(&app.catalog, &event).await;

    app.catalog
        .update(
            event.id,
            EventPatch {
                status: Some(EventStatus::Cancelled),
                ..EventPatch::default()
            },
        )
        .await
        .expect("cancel");

    let error = app
        .coordinator
        .purchase(PurchaseRequest {
            event_id: event.id,
            tier_id: event.tiers[0].id,
            buyer: WalletAddress::new("frank-wallet"),
            quantity: 1,
            signature: None,
        })
        .await
        .expect_err("cancelled events must not sell");
    assert!(matches!(
        error,
        PurchaseError::InvalidState(EventStatus::Cancelled)
    ));
}
