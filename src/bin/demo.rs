//! End-to-end demo against the in-memory store.
//!
//! Creates and publishes an event, fires a burst of concurrent purchases at
//! a deliberately undersized tier to show that it never oversells, then
//! prints the organizer dashboard.
//!
//! Run with: `cargo run --bin demo`

use boxoffice::catalog::EventCatalog;
use boxoffice::config::Config;
use boxoffice::coordinator::PurchaseCoordinator;
use boxoffice::dashboard::DashboardAggregator;
use boxoffice::environment::SystemClock;
use boxoffice::error::PurchaseError;
use boxoffice::store::memory::InMemoryTicketStore;
use boxoffice::types::{
    EventInput, EventPatch, EventStatus, LocationKind, Money, OrganizerId, PurchaseRequest,
    TierInput, TxSignature, WalletAddress,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("boxoffice={}", config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(InMemoryTicketStore::new());
    let clock = Arc::new(SystemClock);
    let catalog = EventCatalog::new(store.clone(), clock.clone());
    let coordinator = Arc::new(
        PurchaseCoordinator::new(store.clone(), clock.clone())
            .with_max_commit_attempts(config.purchase.max_commit_attempts),
    );
    let dashboard = DashboardAggregator::new(store, clock);

    let organizer_id = OrganizerId::new();
    let event = catalog
        .create(EventInput {
            organizer_id,
            title: "Rust Devs Live".to_string(),
            description: "One night only.".to_string(),
            category: "music".to_string(),
            location_kind: LocationKind::Physical,
            location: "Warehouse 9, Lisbon".to_string(),
            banner_ref: None,
            starts_at: Utc::now() + Duration::days(30),
            ends_at: Some(Utc::now() + Duration::days(30) + Duration::hours(6)),
            tiers: vec![
                TierInput {
                    name: "VIP".to_string(),
                    price: Money::from_dollars(120),
                    supply: 3,
                    royalty_percent: 10,
                    resale_allowed: true,
                },
                TierInput {
                    name: "General Admission".to_string(),
                    price: Money::from_dollars(40),
                    supply: 200,
                    royalty_percent: 5,
                    resale_allowed: true,
                },
            ],
        })
        .await?;
    info!(event_id = %event.id, "event created");

    let event = catalog
        .update(
            event.id,
            EventPatch {
                status: Some(EventStatus::Published),
                ..EventPatch::default()
            },
        )
        .await?;
    info!(event_id = %event.id, "event published");

    // 10 buyers race for 3 VIP tickets.
    let vip = event.tiers[0].id;
    let mut handles = Vec::new();
    for n in 0..10 {
        let coordinator = coordinator.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            coordinator
                .purchase(PurchaseRequest {
                    event_id,
                    tier_id: vip,
                    buyer: WalletAddress::new(format!("wallet-{n}")),
                    quantity: 1,
                    signature: Some(TxSignature::new(format!("sig-{n}"))),
                })
                .await
        }));
    }

    let mut sold = 0u32;
    let mut turned_away = 0u32;
    for handle in handles {
        match handle.await? {
            Ok(purchase) => {
                sold += 1;
                info!(purchase_id = %purchase.id, buyer = %purchase.buyer.as_str(), "ticket sold");
            }
            Err(PurchaseError::InsufficientInventory { .. }) => turned_away += 1,
            Err(error) => return Err(error.into()),
        }
    }
    info!(sold, turned_away, "VIP rush finished");

    let summary = dashboard.summarize(organizer_id).await?;
    println!("--- organizer dashboard ---");
    println!("tickets sold:   {}", summary.total_tickets_sold);
    println!("revenue:        {}", summary.total_revenue);
    println!("active events:  {}", summary.active_events);
    for top in &summary.top_events {
        println!("top event:      {} ({})", top.title, top.total_revenue);
    }
    for issue in &summary.issues {
        println!(
            "issue:          {} ({:?}/{:?}, {:.1}% sold)",
            issue.title, issue.severity, issue.kind, issue.sales_percent
        );
    }

    Ok(())
}
