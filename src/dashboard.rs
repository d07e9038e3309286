//! Dashboard aggregator: organizer-facing metrics.
//!
//! A pure read projection over the events owned by one organizer. It never
//! mutates catalog state and may run at any time concurrently with
//! purchases; its output reflects whatever state had committed by the read
//! instant (each purchase commits atomically, so no torn counters are ever
//! observed).

use crate::environment::Clock;
use crate::store::{EventCatalogStore, StoreError, TicketStore};
use crate::types::{Event, EventId, EventStatus, Money, OrganizerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How many events `top_events` and `upcoming_events` keep
const HIGHLIGHT_LIMIT: usize = 3;

/// Sales percentage below which an unstarted published event is flagged
const LOW_SALES_PERCENT: f64 = 20.0;

/// Sales percentage at which a published event is flagged as almost sold out
const ALMOST_SOLD_OUT_PERCENT: f64 = 80.0;

/// Severity of a dashboard issue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Needs organizer attention soon
    High,
    /// Worth watching
    Medium,
}

/// What kind of issue was detected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// Under 20% sold and the event has not started yet
    LowSales,
    /// 80% or more sold, not yet sold out
    AlmostSoldOut,
}

/// An issue flagged for one published event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventIssue {
    /// The event the issue concerns
    pub event_id: EventId,
    /// Event title, for display
    pub title: String,
    /// Issue severity
    pub severity: IssueSeverity,
    /// Issue kind
    pub kind: IssueKind,
    /// Percentage of capacity sold when the summary was taken
    pub sales_percent: f64,
}

/// A revenue-ranked event highlight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopEvent {
    /// Event id
    pub event_id: EventId,
    /// Event title
    pub title: String,
    /// Revenue accumulated by the event
    pub total_revenue: Money,
    /// Tickets sold by the event
    pub total_tickets_sold: u32,
}

/// An upcoming event annotated with time remaining
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEvent {
    /// Event id
    pub event_id: EventId,
    /// Event title
    pub title: String,
    /// When the event starts
    pub starts_at: DateTime<Utc>,
    /// Whole days until the start instant
    pub days_remaining: i64,
}

/// Organizer metrics derived from the catalog at one read instant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Organizer the summary belongs to
    pub organizer_id: OrganizerId,
    /// Tickets sold across all owned events
    pub total_tickets_sold: u64,
    /// Revenue across all owned events
    pub total_revenue: Money,
    /// Royalties earned across all owned events
    pub total_royalties_earned: Money,
    /// Published events that have not ended
    pub active_events: u32,
    /// Up to 3 events ranked by revenue descending
    pub top_events: Vec<TopEvent>,
    /// Up to 3 future events, soonest first
    pub upcoming_events: Vec<UpcomingEvent>,
    /// Detected issues across published events
    pub issues: Vec<EventIssue>,
}

/// Read-only projection producing [`DashboardSummary`] for an organizer
pub struct DashboardAggregator {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
}

impl DashboardAggregator {
    /// Creates a new `DashboardAggregator`
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Summarizes every event owned by `organizer_id`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Backend`]: the storage layer failed
    #[tracing::instrument(skip(self), fields(organizer = %organizer_id))]
    pub async fn summarize(
        &self,
        organizer_id: OrganizerId,
    ) -> Result<DashboardSummary, StoreError> {
        let events = self.store.events_by_organizer(organizer_id).await?;
        let now = self.clock.now();
        Ok(summarize_events(organizer_id, &events, now))
    }
}

/// Pure aggregation over an owned event list at instant `now`
fn summarize_events(
    organizer_id: OrganizerId,
    events: &[Event],
    now: DateTime<Utc>,
) -> DashboardSummary {
    let total_tickets_sold = events
        .iter()
        .map(|e| u64::from(e.total_tickets_sold))
        .sum();
    let total_revenue = events
        .iter()
        .fold(Money::ZERO, |sum, e| sum.add(e.total_revenue));
    let total_royalties_earned = events
        .iter()
        .fold(Money::ZERO, |sum, e| sum.add(e.total_royalties_earned));

    // An event with no scheduled end stays active while published; the
    // purchase path closes sales a day after start instead. See
    // `Event::sales_close_at`.
    let active_events = u32::try_from(
        events
            .iter()
            .filter(|e| e.status == EventStatus::Published)
            .filter(|e| e.ends_at.is_none_or(|ends_at| now < ends_at))
            .count(),
    )
    .unwrap_or(u32::MAX);

    let mut by_revenue: Vec<&Event> = events.iter().collect();
    by_revenue.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    let top_events = by_revenue
        .iter()
        .take(HIGHLIGHT_LIMIT)
        .map(|e| TopEvent {
            event_id: e.id,
            title: e.title.clone(),
            total_revenue: e.total_revenue,
            total_tickets_sold: e.total_tickets_sold,
        })
        .collect();

    let mut future: Vec<&Event> = events.iter().filter(|e| e.is_upcoming(now)).collect();
    future.sort_by_key(|e| e.starts_at);
    let upcoming_events = future
        .iter()
        .take(HIGHLIGHT_LIMIT)
        .map(|e| UpcomingEvent {
            event_id: e.id,
            title: e.title.clone(),
            starts_at: e.starts_at,
            days_remaining: (e.starts_at - now).num_days(),
        })
        .collect();

    let issues = events
        .iter()
        .filter(|e| e.status == EventStatus::Published)
        .filter_map(|e| detect_issue(e, now))
        .collect();

    DashboardSummary {
        organizer_id,
        total_tickets_sold,
        total_revenue,
        total_royalties_earned,
        active_events,
        top_events,
        upcoming_events,
        issues,
    }
}

/// Percentage of capacity sold; 0 when capacity is 0 so an empty event can
/// never divide by zero
fn sales_percent(event: &Event) -> f64 {
    if event.total_capacity == 0 {
        return 0.0;
    }
    f64::from(event.total_tickets_sold) / f64::from(event.total_capacity) * 100.0
}

fn detect_issue(event: &Event, now: DateTime<Utc>) -> Option<EventIssue> {
    let percent = sales_percent(event);
    if percent < LOW_SALES_PERCENT && event.is_upcoming(now) {
        return Some(EventIssue {
            event_id: event.id,
            title: event.title.clone(),
            severity: IssueSeverity::High,
            kind: IssueKind::LowSales,
            sales_percent: percent,
        });
    }
    if (ALMOST_SOLD_OUT_PERCENT..100.0).contains(&percent) {
        return Some(EventIssue {
            event_id: event.id,
            title: event.title.clone(),
            severity: IssueSeverity::Medium,
            kind: IssueKind::AlmostSoldOut,
            sales_percent: percent,
        });
    }
    None
}
