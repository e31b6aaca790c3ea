use chrono::{DateTime, Utc};
use model::ids::{JourneyId, ServerId};
use model::journey::Journey;
use sqlx::PgExecutor;

use crate::error::{convert_error, Result};

#[derive(sqlx::FromRow)]
struct JourneyRow {
    id: uuid::Uuid,
    upstream_run_id: String,
    server_id: uuid::Uuid,
    first_seen_at: Option<DateTime<Utc>>,
    last_seen_at: Option<DateTime<Utc>>,
    cancelled: bool,
}

impl JourneyRow {
    fn into_journey(self) -> Journey {
        Journey {
            id: JourneyId::new(self.id),
            upstream_run_id: self.upstream_run_id,
            server_id: ServerId::new(self.server_id),
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            cancelled: self.cancelled,
            events: Vec::new(),
        }
    }
}

/// Looks up a journey by its natural key without its event list (spec
/// §4.6 step 4 uses this before deciding insert-new vs keep-existing).
pub async fn by_server_and_run<'e>(
    executor: impl PgExecutor<'e>,
    server_id: ServerId,
    upstream_run_id: &str,
) -> Result<Option<Journey>> {
    let row: Option<JourneyRow> = sqlx::query_as(
        "SELECT id, upstream_run_id, server_id, first_seen_at, last_seen_at, cancelled \
         FROM journeys WHERE server_id = $1 AND upstream_run_id = $2",
    )
    .bind(server_id.raw())
    .bind(upstream_run_id)
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?;
    Ok(row.map(JourneyRow::into_journey))
}

/// Inserts a journey shell (no events yet) if it does not already exist
/// under this id. Does not touch `first_seen_at`/events of an existing row.
pub async fn insert_if_absent<'e>(executor: impl PgExecutor<'e>, journey: &Journey) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO journeys (id, upstream_run_id, server_id, cancelled)
        VALUES ($1, $2, $3, false)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(journey.id.raw())
    .bind(&journey.upstream_run_id)
    .bind(journey.server_id.raw())
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(())
}

/// Deletes a journey and its events/vehicles outright (spec §4.6 step 4,
/// "train number changed" case: wipe the old journey before inserting the
/// new one under a different stable id).
pub async fn wipe<'e>(executor: impl PgExecutor<'e> + Copy, journey_id: JourneyId) -> Result<()>
where
{
    sqlx::query("DELETE FROM journey_vehicles WHERE journey_id = $1")
        .bind(journey_id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    sqlx::query("DELETE FROM journey_events WHERE journey_id = $1")
        .bind(journey_id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    sqlx::query("DELETE FROM journeys WHERE id = $1")
        .bind(journey_id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    Ok(())
}

pub async fn mark_first_seen<'e>(
    executor: impl PgExecutor<'e>,
    journey_id: JourneyId,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE journeys SET first_seen_at = $2 WHERE id = $1 AND first_seen_at IS NULL")
        .bind(journey_id.raw())
        .bind(at)
        .execute(executor)
        .await
        .map_err(convert_error)?;
    Ok(())
}

pub async fn mark_last_seen<'e>(
    executor: impl PgExecutor<'e>,
    journey_id: JourneyId,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE journeys SET last_seen_at = $2 WHERE id = $1")
        .bind(journey_id.raw())
        .bind(at)
        .execute(executor)
        .await
        .map_err(convert_error)?;
    Ok(())
}

pub async fn mark_cancelled<'e>(
    executor: impl PgExecutor<'e>,
    journey_id: JourneyId,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE journeys SET cancelled = true, updated_at = $2 WHERE id = $1")
        .bind(journey_id.raw())
        .bind(at)
        .execute(executor)
        .await
        .map_err(convert_error)?;
    Ok(())
}

/// Journeys whose second playable departure is before `cutoff` and which
/// never actually spawned (spec §4.10 cancellation marking task).
pub async fn never_spawned_before<'e>(
    executor: impl PgExecutor<'e>,
    server_id: ServerId,
    cutoff: DateTime<Utc>,
) -> Result<Vec<JourneyId>> {
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        r#"
        SELECT j.id FROM journeys j
        JOIN LATERAL (
            SELECT scheduled_time FROM journey_events e
            WHERE e.journey_id = j.id AND e.event_type = 'DEPARTURE' AND e.in_playable_border = true
            ORDER BY e.event_index ASC
            OFFSET 1 LIMIT 1
        ) second_departure ON true
        WHERE j.server_id = $1
          AND j.first_seen_at IS NULL
          AND second_departure.scheduled_time < $2
        "#,
    )
    .bind(server_id.raw())
    .bind(cutoff)
    .fetch_all(executor)
    .await
    .map_err(convert_error)?;
    Ok(rows.into_iter().map(|(id,)| JourneyId::new(id)).collect())
}

/// Journeys with no data update in the last 90 days (spec §4.10 cleanup
/// task).
pub async fn without_update_since<'e>(
    executor: impl PgExecutor<'e>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<JourneyId>> {
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT id FROM journeys WHERE COALESCE(updated_at, last_seen_at, first_seen_at) < $1 \
         OR (first_seen_at IS NULL AND last_seen_at IS NULL AND updated_at IS NULL)",
    )
    .bind(cutoff)
    .fetch_all(executor)
    .await
    .map_err(convert_error)?;
    Ok(rows.into_iter().map(|(id,)| JourneyId::new(id)).collect())
}
