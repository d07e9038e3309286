//! Durable `PostgreSQL` ticket store.
//!
//! Events are stored as one JSONB document per aggregate next to a
//! `version` column; optimistic concurrency is a guarded `UPDATE ... WHERE
//! version = $expected`. `commit_purchase` wraps the guarded update and the
//! purchase insert in a single transaction, and a unique index on the
//! purchase signature enforces global replay protection at the database
//! level.

use crate::config::PostgresConfig;
use crate::store::{
    EventCatalogStore, PurchaseLedger, StoreError, StoreFuture, TicketStore, Version,
};
use crate::types::{Event, EventId, OrganizerId, Purchase, PurchaseId, TxSignature};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS catalog_events (
    id UUID PRIMARY KEY,
    organizer_id UUID NOT NULL,
    status TEXT NOT NULL,
    starts_at TIMESTAMPTZ NOT NULL,
    version BIGINT NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS catalog_events_organizer_idx
    ON catalog_events (organizer_id, starts_at);
CREATE INDEX IF NOT EXISTS catalog_events_status_idx
    ON catalog_events (status, starts_at);

CREATE TABLE IF NOT EXISTS purchases (
    id UUID PRIMARY KEY,
    event_id UUID NOT NULL,
    signature TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    seq BIGSERIAL,
    data JSONB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS purchases_signature_idx
    ON purchases (signature) WHERE signature IS NOT NULL;
CREATE INDEX IF NOT EXISTS purchases_event_idx
    ON purchases (event_id, seq);
";

/// `PostgreSQL`-backed implementation of [`TicketStore`]
#[derive(Debug, Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Connects to the database per the given configuration and ensures
    /// the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection or schema setup
    /// fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect: {e}")))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wraps an existing pool. The schema is not touched; call
    /// [`Self::ensure_schema`] if needed.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables and indexes if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if any statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// The underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn decode_event(data: serde_json::Value) -> Result<Event, StoreError> {
        serde_json::from_value(data)
            .map_err(|e| StoreError::Backend(format!("corrupt event document: {e}")))
    }

    fn decode_purchase(data: serde_json::Value) -> Result<Purchase, StoreError> {
        serde_json::from_value(data)
            .map_err(|e| StoreError::Backend(format!("corrupt purchase document: {e}")))
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn encode_version(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::Backend(format!("version out of range: {version}")))
}

fn decode_version(raw: i64) -> Result<Version, StoreError> {
    u64::try_from(raw)
        .map(Version::new)
        .map_err(|_| StoreError::Backend(format!("negative version in store: {raw}")))
}

fn encode_document<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Backend(format!("failed to encode document: {e}")))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Distinguishes a version conflict from a vanished event after a guarded
/// update touched zero rows
async fn classify_missed_update(
    executor: &mut sqlx::PgConnection,
    event_id: EventId,
    expected: Version,
) -> StoreError {
    let row = sqlx::query("SELECT version FROM catalog_events WHERE id = $1")
        .bind(event_id.as_uuid())
        .fetch_optional(executor)
        .await;
    match row {
        Ok(Some(row)) => match decode_version(row.get::<i64, _>("version")) {
            Ok(actual) => StoreError::Conflict {
                event_id,
                expected,
                actual,
            },
            Err(error) => error,
        },
        Ok(None) => StoreError::EventNotFound(event_id),
        Err(error) => backend(error),
    }
}

impl EventCatalogStore for PostgresTicketStore {
    fn insert_event(&self, event: Event) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let version = Version::default();
            let data = encode_document(&event)?;
            sqlx::query(
                "INSERT INTO catalog_events (id, organizer_id, status, starts_at, version, data)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(event.id.as_uuid())
            .bind(event.organizer_id.as_uuid())
            .bind(status_label(&event))
            .bind(event.starts_at)
            .bind(encode_version(version)?)
            .bind(data)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
            Ok(version)
        })
    }

    fn load_event(&self, event_id: EventId) -> StoreFuture<'_, (Event, Version)> {
        Box::pin(async move {
            let row = sqlx::query("SELECT data, version FROM catalog_events WHERE id = $1")
                .bind(event_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?
                .ok_or(StoreError::EventNotFound(event_id))?;
            let event = Self::decode_event(row.get("data"))?;
            let version = decode_version(row.get::<i64, _>("version"))?;
            Ok((event, version))
        })
    }

    fn update_event(&self, event: Event, expected: Version) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let data = encode_document(&event)?;
            let next = expected.next();
            let result = sqlx::query(
                "UPDATE catalog_events
                 SET data = $1, status = $2, starts_at = $3, version = $4
                 WHERE id = $5 AND version = $6",
            )
            .bind(data)
            .bind(status_label(&event))
            .bind(event.starts_at)
            .bind(encode_version(next)?)
            .bind(event.id.as_uuid())
            .bind(encode_version(expected)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            if result.rows_affected() == 0 {
                let mut conn = self.pool.acquire().await.map_err(backend)?;
                return Err(classify_missed_update(&mut *conn, event.id, expected).await);
            }
            Ok(next)
        })
    }

    fn events_by_organizer(&self, organizer_id: OrganizerId) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT data FROM catalog_events
                 WHERE organizer_id = $1
                 ORDER BY starts_at, id",
            )
            .bind(organizer_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
            rows.into_iter()
                .map(|row| Self::decode_event(row.get("data")))
                .collect()
        })
    }

    fn published_events(&self) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT data FROM catalog_events
                 WHERE status = 'published'
                 ORDER BY starts_at, id",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
            rows.into_iter()
                .map(|row| Self::decode_event(row.get("data")))
                .collect()
        })
    }
}

impl PurchaseLedger for PostgresTicketStore {
    fn load_purchase(&self, purchase_id: PurchaseId) -> StoreFuture<'_, Purchase> {
        Box::pin(async move {
            let row = sqlx::query("SELECT data FROM purchases WHERE id = $1")
                .bind(purchase_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?
                .ok_or(StoreError::PurchaseNotFound(purchase_id))?;
            Self::decode_purchase(row.get("data"))
        })
    }

    fn purchases_for_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<Purchase>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT data FROM purchases WHERE event_id = $1 ORDER BY seq",
            )
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
            rows.into_iter()
                .map(|row| Self::decode_purchase(row.get("data")))
                .collect()
        })
    }
}

impl TicketStore for PostgresTicketStore {
    fn commit_purchase(
        &self,
        event: Event,
        expected: Version,
        purchase: Purchase,
    ) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(backend)?;

            let data = encode_document(&event)?;
            let next = expected.next();
            let result = sqlx::query(
                "UPDATE catalog_events
                 SET data = $1, status = $2, starts_at = $3, version = $4
                 WHERE id = $5 AND version = $6",
            )
            .bind(data)
            .bind(status_label(&event))
            .bind(event.starts_at)
            .bind(encode_version(next)?)
            .bind(event.id.as_uuid())
            .bind(encode_version(expected)?)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls it back.
                return Err(classify_missed_update(&mut *tx, event.id, expected).await);
            }

            let purchase_data = encode_document(&purchase)?;
            let signature = purchase.signature.as_ref().map(TxSignature::as_str);
            let insert = sqlx::query(
                "INSERT INTO purchases (id, event_id, signature, created_at, data)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(purchase.id.as_uuid())
            .bind(purchase.event_id.as_uuid())
            .bind(signature)
            .bind(purchase.created_at)
            .bind(purchase_data)
            .execute(&mut *tx)
            .await;

            if let Err(error) = insert {
                if is_unique_violation(&error) {
                    if let Some(signature) = purchase.signature {
                        return Err(StoreError::DuplicateSignature(signature));
                    }
                }
                return Err(backend(error));
            }

            tx.commit().await.map_err(backend)?;
            Ok(next)
        })
    }
}

/// Serde's lowercase label for the event status, kept in a plain column so
/// listings can filter without unpacking JSONB
fn status_label(event: &Event) -> String {
    serde_json::to_value(event.status)
        .ok()
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| "draft".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventStatus, LocationKind, Money};
    use chrono::Utc;

    fn sample_event(status: EventStatus) -> Event {
        Event {
            id: EventId::new(),
            organizer_id: OrganizerId::new(),
            title: "Sample".to_string(),
            description: "desc".to_string(),
            category: "music".to_string(),
            location_kind: LocationKind::Virtual,
            location: "https://example.com".to_string(),
            banner_ref: None,
            status,
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

    #[test]
    fn version_round_trips_through_bigint() {
        let version = Version::new(42);
        let raw = encode_version(version).unwrap();
        assert_eq!(decode_version(raw).unwrap(), version);
    }

    #[test]
    fn negative_stored_version_is_a_backend_error() {
        assert!(matches!(decode_version(-1), Err(StoreError::Backend(_))));
    }

    #[test]
    fn status_labels_match_the_document_encoding() {
        assert_eq!(status_label(&sample_event(EventStatus::Published)), "published");
        assert_eq!(status_label(&sample_event(EventStatus::Cancelled)), "cancelled");
    }
}
