use model::ids::JourneyId;
use sqlx::PgExecutor;

use crate::error::{convert_error, Result};

/// Deletes a journey's vehicles, then events, then the journey itself
/// (spec §4.10 cleanup task ordering, foreign-key-safe).
pub async fn delete_journey_cascade<'e>(
    executor: impl PgExecutor<'e> + Copy,
    journey_id: JourneyId,
) -> Result<()> {
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
    metrics::counter!("cleanup_journeys_deleted_total").increment(1);
    Ok(())
}
