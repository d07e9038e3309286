//! Domain types for the ticket inventory and purchase engine.
//!
//! This module contains the value objects and entities shared by the catalog,
//! the purchase coordinator, and the dashboard aggregator: identifier
//! newtypes, the cents-based `Money` value object, and the `Event` /
//! `TicketTier` / `Purchase` aggregate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a ticket tier, independent of its position in the
/// event's tier list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierId(Uuid);

impl TierId {
    /// Creates a new random `TierId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TierId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TierId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(Uuid);

impl PurchaseId {
    /// Creates a new random `PurchaseId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PurchaseId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the organizer who owns and administers an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizerId(Uuid);

impl OrganizerId {
    /// Creates a new random `OrganizerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrganizerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrganizerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrganizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buyer wallet identity.
///
/// Opaque to the engine: wallet authentication happens before a request
/// reaches this core, so no address format is enforced beyond non-emptiness
/// (checked by the coordinator).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Creates a new `WalletAddress`
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks whether the address is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External transaction signature attached to a purchase.
///
/// Produced by the on-chain confirmation flow outside this core. When
/// present it must be globally unique across all purchases so a replayed
/// confirmation can never allocate a second ticket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxSignature(String);

impl TxSignature {
    /// Creates a new `TxSignature`
    #[must_use]
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    /// Returns the signature as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Money(u64);

impl Money {
    /// The zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole dollars
    ///
    /// # Panics
    ///
    /// Panics if the conversion would overflow (dollars * 100 > `u64::MAX`).
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn from_dollars(dollars: u64) -> Self {
        match dollars.checked_mul(100) {
            Some(cents) => Self(cents),
            None => panic!("Money::from_dollars overflow"),
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts
    ///
    /// # Panics
    ///
    /// Panics if the addition would overflow.
    /// Use `checked_add` for non-panicking addition.
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn add(self, other: Self) -> Self {
        match self.checked_add(other) {
            Some(result) => result,
            None => panic!("Money::add overflow"),
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity
    ///
    /// # Panics
    ///
    /// Panics if the multiplication would overflow.
    /// Use `checked_multiply` for non-panicking multiplication.
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn multiply(self, quantity: u32) -> Self {
        match self.checked_multiply(quantity) {
            Some(result) => result,
            None => panic!("Money::multiply overflow"),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Status Enums
// ============================================================================

/// Event lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Event is being configured by its organizer (not purchasable)
    Draft,
    /// Event is live and accepting purchases
    Published,
    /// Event has taken place
    Ended,
    /// Event was cancelled by its organizer
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// Where an event takes place
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// In-person event at a physical venue
    Physical,
    /// Online event
    Virtual,
}

/// Purchase lifecycle status.
///
/// A purchase is created `Completed` by the coordinator. The later
/// transitions (check-in, resale, refunds) are driven by collaborators
/// outside this core; the variants exist so downstream consumers share one
/// vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PurchaseStatus {
    /// Ticket allocated and counters committed
    Completed,
    /// Awaiting external confirmation
    Pending,
    /// External confirmation failed
    Failed,
    /// Purchase refunded
    Refunded,
    /// Purchase cancelled
    Cancelled,
    /// Attendee checked in at the venue
    CheckedIn,
    /// Ticket resold on the secondary market
    Resold,
}

// ============================================================================
// Domain Entities
// ============================================================================

/// Maximum royalty percentage an organizer may reserve on resales
pub const MAX_ROYALTY_PERCENT: u8 = 15;

/// A named ticket class within an event, with independent price, supply and
/// royalty settings.
///
/// Invariant: `0 <= tickets_sold <= supply`. Only the purchase coordinator
/// writes `tickets_sold`, `revenue` and `purchase_ids`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketTier {
    /// Stable tier identifier
    pub id: TierId,
    /// Tier name (e.g. "General Admission", "VIP")
    pub name: String,
    /// Price per ticket
    pub price: Money,
    /// Capacity for this tier
    pub supply: u32,
    /// Tickets sold so far
    pub tickets_sold: u32,
    /// Revenue accumulated by this tier
    pub revenue: Money,
    /// Royalty percentage reserved for the organizer on resales, in [0, 15]
    pub royalty_percent: u8,
    /// Whether secondary-market resale is allowed for this tier
    pub resale_allowed: bool,
    /// Purchases recorded against this tier, in commit order
    pub purchase_ids: Vec<PurchaseId>,
}

impl TicketTier {
    /// Returns the number of tickets still available (computed, not stored)
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.supply.saturating_sub(self.tickets_sold)
    }

    /// Checks if the requested quantity is available
    #[must_use]
    pub const fn has_availability(&self, quantity: u32) -> bool {
        self.available() >= quantity
    }
}

/// Event entity owning its tier list and aggregate counters.
///
/// Invariants: `total_capacity == Σ tier.supply` and
/// `0 <= total_tickets_sold <= total_capacity`. The catalog exclusively owns
/// event mutation; the coordinator is the only writer of the sale counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Organizer who owns this event
    pub organizer_id: OrganizerId,
    /// Event title
    pub title: String,
    /// Event description
    pub description: String,
    /// Event category (e.g. "music", "conference")
    pub category: String,
    /// Physical or virtual
    pub location_kind: LocationKind,
    /// Venue address or meeting URL
    pub location: String,
    /// Opaque reference to externally stored banner media
    pub banner_ref: Option<String>,
    /// Current lifecycle status
    pub status: EventStatus,
    /// When the event starts
    pub starts_at: DateTime<Utc>,
    /// When the event ends, if an end was scheduled
    pub ends_at: Option<DateTime<Utc>>,
    /// Ticket tiers, in organizer-defined order
    pub tiers: Vec<TicketTier>,
    /// Sum of tier supplies
    pub total_capacity: u32,
    /// Tickets sold across all tiers
    pub total_tickets_sold: u32,
    /// Revenue across all tiers
    pub total_revenue: Money,
    /// Royalties earned from secondary-market resales
    pub total_royalties_earned: Money,
    /// Attendees checked in at the venue
    pub total_attendees_checked_in: u32,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Finds a tier by its stable id
    #[must_use]
    pub fn tier(&self, tier_id: TierId) -> Option<&TicketTier> {
        self.tiers.iter().find(|t| t.id == tier_id)
    }

    /// Finds a tier by its stable id, mutably
    pub fn tier_mut(&mut self, tier_id: TierId) -> Option<&mut TicketTier> {
        self.tiers.iter_mut().find(|t| t.id == tier_id)
    }

    /// The instant after which purchases are no longer accepted.
    ///
    /// Events with a scheduled end close at that end. Events without one
    /// close 24 hours after they start, so a single-day event cannot keep
    /// selling indefinitely. Note that the dashboard's notion of an
    /// *active* event deliberately differs: an event with no end instant
    /// counts as active while published (see `dashboard`).
    #[must_use]
    pub fn sales_close_at(&self) -> DateTime<Utc> {
        self.ends_at
            .unwrap_or_else(|| self.starts_at + Duration::hours(24))
    }

    /// Checks whether purchases are closed at `now`
    #[must_use]
    pub fn sales_closed(&self, now: DateTime<Utc>) -> bool {
        now > self.sales_close_at()
    }

    /// Checks whether the event starts after `now`
    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.starts_at > now
    }
}

/// Purchase record: one accepted allocation of tickets from a single tier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique purchase identifier
    pub id: PurchaseId,
    /// Event the tickets belong to
    pub event_id: EventId,
    /// Tier the tickets were allocated from
    pub tier_id: TierId,
    /// Buyer wallet identity
    pub buyer: WalletAddress,
    /// Number of tickets, >= 1
    pub quantity: u32,
    /// Tier price at purchase time
    pub price_per_unit: Money,
    /// `price_per_unit * quantity`
    pub total_price: Money,
    /// Current purchase status
    pub status: PurchaseStatus,
    /// External transaction signature, globally unique when present
    pub signature: Option<TxSignature>,
    /// When the purchase was committed
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Inputs
// ============================================================================

/// Tier definition supplied by the organizer on create/update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierInput {
    /// Tier name, non-empty and unique within the event
    pub name: String,
    /// Price per ticket
    pub price: Money,
    /// Capacity for this tier, >= 1
    pub supply: u32,
    /// Royalty percentage in [0, 15]
    pub royalty_percent: u8,
    /// Whether resale is allowed
    pub resale_allowed: bool,
}

/// Payload for creating an event.
///
/// Binary banner data is handled by an external collaborator; only the
/// opaque reference string reaches this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    /// Organizer who will own the event
    pub organizer_id: OrganizerId,
    /// Event title
    pub title: String,
    /// Event description
    pub description: String,
    /// Event category
    pub category: String,
    /// Physical or virtual
    pub location_kind: LocationKind,
    /// Venue address or meeting URL
    pub location: String,
    /// Opaque banner reference
    pub banner_ref: Option<String>,
    /// When the event starts
    pub starts_at: DateTime<Utc>,
    /// When the event ends, if scheduled
    pub ends_at: Option<DateTime<Utc>>,
    /// Initial tier list, non-empty
    pub tiers: Vec<TierInput>,
}

/// Partial update for an event. `None` fields are left unchanged; a
/// provided tier list replaces the existing one (see
/// [`crate::catalog::EventCatalog::update`]).
///
/// Because `None` always means "keep", a patch can set `ends_at` or
/// `banner_ref` but never clear them back to unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New location kind
    pub location_kind: Option<LocationKind>,
    /// New location
    pub location: Option<String>,
    /// New banner reference
    pub banner_ref: Option<String>,
    /// New lifecycle status (publish / end / cancel)
    pub status: Option<EventStatus>,
    /// New start instant
    pub starts_at: Option<DateTime<Utc>>,
    /// New end instant
    pub ends_at: Option<DateTime<Utc>>,
    /// Replacement tier list
    pub tiers: Option<Vec<TierInput>>,
}

/// A request to purchase tickets, already authenticated and parsed at the
/// system boundary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Event to purchase from
    pub event_id: EventId,
    /// Tier to purchase from
    pub tier_id: TierId,
    /// Buyer wallet identity, non-empty
    pub buyer: WalletAddress,
    /// Number of tickets, >= 1
    pub quantity: u32,
    /// External transaction signature, if the confirmation flow produced one
    pub signature: Option<TxSignature>,
}
