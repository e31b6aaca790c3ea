use chrono::{DateTime, Local};
use model::ids::{JourneyEventId, JourneyId};
use model::journey_event::{
    EventType, JourneyEvent, PassengerStopInfo, RealtimeTimeType, StopType, TransportDescriptor,
};
use sqlx::{PgExecutor, Postgres, Transaction};

use crate::error::{convert_error, Result};

fn event_type_str(t: EventType) -> &'static str {
    match t {
        EventType::Arrival => "ARRIVAL",
        EventType::Departure => "DEPARTURE",
    }
}
fn parse_event_type(s: &str) -> EventType {
    match s {
        "DEPARTURE" => EventType::Departure,
        _ => EventType::Arrival,
    }
}

fn realtime_type_str(t: RealtimeTimeType) -> &'static str {
    match t {
        RealtimeTimeType::Schedule => "SCHEDULE",
        RealtimeTimeType::Prediction => "PREDICTION",
        RealtimeTimeType::Real => "REAL",
    }
}
fn parse_realtime_type(s: &str) -> RealtimeTimeType {
    match s {
        "PREDICTION" => RealtimeTimeType::Prediction,
        "REAL" => RealtimeTimeType::Real,
        _ => RealtimeTimeType::Schedule,
    }
}

fn stop_type_str(t: StopType) -> &'static str {
    match t {
        StopType::None => "NONE",
        StopType::Technical => "TECHNICAL",
        StopType::Passenger => "PASSENGER",
    }
}
fn parse_stop_type(s: &str) -> StopType {
    match s {
        "TECHNICAL" => StopType::Technical,
        "PASSENGER" => StopType::Passenger,
        _ => StopType::None,
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: uuid::Uuid,
    journey_id: uuid::Uuid,
    event_type: String,
    event_index: i64,
    point_id: String,
    transport: serde_json::Value,
    scheduled_time: DateTime<Local>,
    realtime_time: DateTime<Local>,
    realtime_time_type: String,
    stop_type: String,
    scheduled_passenger_stop: Option<serde_json::Value>,
    realtime_passenger_stop: Option<serde_json::Value>,
    cancelled: bool,
    additional: bool,
    in_playable_border: bool,
}

impl EventRow {
    fn into_event(self) -> JourneyEvent {
        JourneyEvent {
            id: JourneyEventId::new(self.id),
            journey_id: JourneyId::new(self.journey_id),
            event_type: parse_event_type(&self.event_type),
            event_index: self.event_index,
            point_id: self.point_id,
            transport: serde_json::from_value(self.transport).unwrap_or_default(),
            scheduled_time: self.scheduled_time,
            realtime_time: self.realtime_time,
            realtime_time_type: parse_realtime_type(&self.realtime_time_type),
            stop_type: parse_stop_type(&self.stop_type),
            scheduled_passenger_stop: self
                .scheduled_passenger_stop
                .and_then(|v| serde_json::from_value::<PassengerStopInfo>(v).ok()),
            realtime_passenger_stop: self
                .realtime_passenger_stop
                .and_then(|v| serde_json::from_value::<PassengerStopInfo>(v).ok()),
            cancelled: self.cancelled,
            additional: self.additional,
            in_playable_border: self.in_playable_border,
        }
    }

    fn transport_json(transport: &TransportDescriptor) -> serde_json::Value {
        serde_json::to_value(transport).expect("TransportDescriptor always serializes")
    }

    fn stop_json(stop: &Option<PassengerStopInfo>) -> Option<serde_json::Value> {
        stop.as_ref().map(|s| serde_json::to_value(s).expect("PassengerStopInfo always serializes"))
    }
}

/// Events of a journey sorted by `event_index` (spec §6).
pub async fn for_journey<'e>(
    executor: impl PgExecutor<'e>,
    journey_id: JourneyId,
) -> Result<Vec<JourneyEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(
        "SELECT * FROM journey_events WHERE journey_id = $1 ORDER BY event_index ASC",
    )
    .bind(journey_id.raw())
    .fetch_all(executor)
    .await
    .map_err(convert_error)?;
    Ok(rows.into_iter().map(EventRow::into_event).collect())
}

async fn insert_one<'e>(executor: impl PgExecutor<'e>, event: &JourneyEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO journey_events
            (id, journey_id, event_type, event_index, point_id, transport, scheduled_time,
             realtime_time, realtime_time_type, stop_type, scheduled_passenger_stop,
             realtime_passenger_stop, cancelled, additional, in_playable_border)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (id) DO UPDATE SET
            event_index = EXCLUDED.event_index,
            scheduled_time = EXCLUDED.scheduled_time,
            realtime_time = EXCLUDED.realtime_time,
            realtime_time_type = EXCLUDED.realtime_time_type,
            stop_type = EXCLUDED.stop_type,
            scheduled_passenger_stop = EXCLUDED.scheduled_passenger_stop,
            realtime_passenger_stop = EXCLUDED.realtime_passenger_stop,
            cancelled = EXCLUDED.cancelled
        "#,
    )
    .bind(event.id.raw())
    .bind(event.journey_id.raw())
    .bind(event_type_str(event.event_type))
    .bind(event.event_index)
    .bind(&event.point_id)
    .bind(EventRow::transport_json(&event.transport))
    .bind(event.scheduled_time)
    .bind(event.realtime_time)
    .bind(realtime_type_str(event.realtime_time_type))
    .bind(stop_type_str(event.stop_type))
    .bind(EventRow::stop_json(&event.scheduled_passenger_stop))
    .bind(EventRow::stop_json(&event.realtime_passenger_stop))
    .bind(event.cancelled)
    .bind(event.additional)
    .bind(event.in_playable_border)
    .execute(executor)
    .await
    .map_err(convert_error)?;
    Ok(())
}

/// Batch insert of the timetable builder's freshly built event list (spec
/// §6 "batch insert of events for one journey").
pub async fn insert_batch<'e>(
    executor: impl PgExecutor<'e> + Copy,
    events: &[JourneyEvent],
) -> Result<()> {
    for event in events {
        insert_one(executor, event).await?;
    }
    Ok(())
}

/// Transactional event update (spec §6): the realtime updater always
/// confirms/re-predicts a whole tail of events together, so this replaces
/// them as one unit inside the caller's transaction.
pub async fn save_in_transaction(
    tx: &mut Transaction<'_, Postgres>,
    events: &[JourneyEvent],
) -> Result<()> {
    for event in events {
        insert_one(&mut **tx, event).await?;
    }
    Ok(())
}

pub async fn delete_for_journey<'e>(executor: impl PgExecutor<'e>, journey_id: JourneyId) -> Result<()> {
    sqlx::query("DELETE FROM journey_events WHERE journey_id = $1")
        .bind(journey_id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    Ok(())
}
