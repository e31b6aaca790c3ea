use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::ids::{JourneyEventId, JourneyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Arrival,
    Departure,
}

/// Confidence in a scheduled/predicted/observed time (spec §3).
///
/// Ordering of preference is SCHEDULE < PREDICTION < REAL; `REAL` is
/// absorbing (spec §8 property 4) -- once set it is never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeTimeType {
    Schedule,
    Prediction,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StopType {
    None,
    Technical,
    Passenger,
}

/// The parsed human-readable train designation (spec §4.6.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDescriptor {
    pub category: Option<String>,
    pub number: String,
    pub transport_type: String,
    /// Only retained for REGIONAL_TRAIN / REGIONAL_FAST_TRAIN.
    pub line: Option<String>,
    pub label: Option<String>,
    pub max_speed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerStopInfo {
    pub track: String,
    pub platform: String,
}

/// One ARRIVAL or DEPARTURE of a journey at a point (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyEvent {
    pub id: JourneyEventId,
    pub journey_id: JourneyId,
    pub event_type: EventType,
    pub event_index: i64,
    pub point_id: String,
    pub transport: TransportDescriptor,
    pub scheduled_time: DateTime<Local>,
    pub realtime_time: DateTime<Local>,
    pub realtime_time_type: RealtimeTimeType,
    pub stop_type: StopType,
    pub scheduled_passenger_stop: Option<PassengerStopInfo>,
    pub realtime_passenger_stop: Option<PassengerStopInfo>,
    pub cancelled: bool,
    /// True iff this event was inserted just-in-time by the updater rather
    /// than produced by the timetable builder.
    pub additional: bool,
    pub in_playable_border: bool,
}

impl JourneyEvent {
    pub fn set_realtime(&mut self, time: DateTime<Local>, kind: RealtimeTimeType) {
        if self.realtime_time_type == RealtimeTimeType::Real && kind != RealtimeTimeType::Real {
            // REAL is absorbing; spec §8 property 4.
            return;
        }
        self.realtime_time = time;
        self.realtime_time_type = kind;
    }
}
