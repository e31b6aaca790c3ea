//! The realtime-event-updater's core state transitions (spec §4.8). The
//! single-writer queue consumer and its transactional retry loop live in the
//! `collectors` crate; this module is the pure, synchronous algorithm it
//! drives so it can be unit tested without a database or a queue.

use chrono::{DateTime, Duration, Local, Timelike};

use model::ids::journey_event_jit_id;
use model::journey_event::{
    EventType, JourneyEvent, PassengerStopInfo, RealtimeTimeType, StopType, TransportDescriptor,
};
use reference::platform_signal::{PlatformSignalInfo, PlatformSignalProvider};

/// What the realtime train collector knows about the point a journey just
/// reached, as much as the updater needs to decide on JIT insertion (spec
/// §4.8 "Arrival at a point", §9 "Polymorphic update request").
#[derive(Debug, Clone)]
pub struct JitCandidate {
    pub point_id: String,
    /// Whether the point is the kind that can host a scheduled stop at all
    /// ("has no prefix" in the spec's wording means it's a plain passing
    /// point, never schedulable).
    pub has_schedulable_prefix: bool,
    pub point_max_speed: Option<u32>,
    pub in_playable_border: bool,
}

#[derive(Debug, Clone)]
pub enum UpdateRequest {
    Removal {
        server_local_time: DateTime<Local>,
    },
    PointChange {
        server_local_time: DateTime<Local>,
        prev_point_id: Option<String>,
        curr_point: Option<JitCandidate>,
        next_signal_name: Option<String>,
    },
    SignalUpdate {
        server_local_time: DateTime<Local>,
        curr_point_id: String,
        signal_name: String,
    },
}

/// Spec §4.8 "Removal": walk from the tail, cancelling everything not
/// already REAL or cancelled, stopping at the first one that is.
pub fn apply_removal(events: &mut [JourneyEvent]) {
    for event in events.iter_mut().rev() {
        if event.realtime_time_type == RealtimeTimeType::Real || event.cancelled {
            break;
        }
        event.cancelled = true;
    }
}

fn round_to_minute(time: DateTime<Local>) -> DateTime<Local> {
    let seconds = time.second();
    let floor = time - Duration::seconds(seconds as i64) - Duration::nanoseconds(time.nanosecond() as i64);
    if seconds >= 30 {
        floor + Duration::minutes(1)
    } else {
        floor
    }
}

/// Spec §4.8.1: confirm `events[index]` as REAL at `server_time`, cancel
/// every earlier not-yet-REAL event, then re-predict forward until a
/// prediction matches its own schedule.
pub fn confirm_and_repredict(events: &mut [JourneyEvent], index: usize, server_time: DateTime<Local>) {
    events[index].cancelled = false;
    events[index].realtime_time = server_time;
    events[index].realtime_time_type = RealtimeTimeType::Real;

    for event in events[..index].iter_mut().rev() {
        if event.realtime_time_type == RealtimeTimeType::Real {
            break;
        }
        event.cancelled = true;
    }

    let mut last_scheduled = events[index].scheduled_time;
    let mut last_realtime = events[index].realtime_time;

    for i in (index + 1)..events.len() {
        let this_scheduled = events[i].scheduled_time;
        let predicted = match events[i].event_type {
            EventType::Arrival => last_realtime + (this_scheduled - last_scheduled),
            EventType::Departure => match events[i].stop_type {
                StopType::None => last_realtime,
                StopType::Technical => {
                    let delay = last_realtime - last_scheduled;
                    let stop = this_scheduled - last_scheduled;
                    if delay - stop > Duration::zero() {
                        this_scheduled + (delay - stop)
                    } else {
                        this_scheduled
                    }
                }
                StopType::Passenger => {
                    let stop = this_scheduled - last_scheduled;
                    let skippable = stop - Duration::minutes(1);
                    if skippable > Duration::zero() {
                        let delay = last_realtime - last_scheduled;
                        if delay - skippable > Duration::zero() {
                            this_scheduled + (delay - skippable)
                        } else {
                            this_scheduled
                        }
                    } else {
                        std::cmp::max(this_scheduled, last_realtime + stop)
                    }
                }
            },
        };

        let rounded = round_to_minute(predicted);
        let was_cancelled = events[i].cancelled;
        events[i].cancelled = false;
        events[i].set_realtime(rounded, RealtimeTimeType::Prediction);

        last_scheduled = this_scheduled;
        last_realtime = rounded;

        if !was_cancelled && rounded == this_scheduled {
            break;
        }
    }
}

/// Spec §4.8 "Arrival at a point", JIT gating. Returns the index of the
/// inserted ARRIVAL, or `None` if no pair was inserted.
pub fn maybe_insert_jit(
    events: &mut Vec<JourneyEvent>,
    candidate: &JitCandidate,
    server_time: DateTime<Local>,
) -> Option<usize> {
    if !candidate.has_schedulable_prefix {
        return None;
    }

    let last_real_departure = events
        .iter()
        .rev()
        .find(|e| e.realtime_time_type == RealtimeTimeType::Real && e.event_type == EventType::Departure)?;
    if last_real_departure.point_id == candidate.point_id {
        return None;
    }

    let previous = events.last()?.clone();
    let prev_index = events.iter().map(|e| e.event_index).max().unwrap_or(0);
    let max_speed_seen = events.iter().map(|e| e.transport.max_speed).max().unwrap_or(0);
    let max_speed = match candidate.point_max_speed {
        Some(point_max) => max_speed_seen.min(point_max),
        None => max_speed_seen,
    };
    let rounded_time = round_to_minute(server_time);

    let arrival_id = journey_event_jit_id(previous.journey_id, &candidate.point_id, previous.id, "ARRIVAL");
    let arrival = JourneyEvent {
        id: arrival_id,
        journey_id: previous.journey_id,
        event_type: EventType::Arrival,
        event_index: prev_index + 1,
        point_id: candidate.point_id.clone(),
        transport: TransportDescriptor {
            max_speed,
            ..previous.transport.clone()
        },
        scheduled_time: rounded_time,
        realtime_time: rounded_time,
        realtime_time_type: RealtimeTimeType::Real,
        stop_type: StopType::None,
        scheduled_passenger_stop: None,
        realtime_passenger_stop: None,
        cancelled: false,
        additional: true,
        in_playable_border: candidate.in_playable_border,
    };
    let departure = JourneyEvent {
        id: journey_event_jit_id(previous.journey_id, &candidate.point_id, arrival_id, "DEPARTURE"),
        event_type: EventType::Departure,
        event_index: prev_index + 2,
        realtime_time_type: RealtimeTimeType::Prediction,
        ..arrival.clone()
    };

    events.push(arrival);
    events.push(departure);
    events.sort_by_key(|e| e.event_index);
    events.iter().position(|e| e.id == arrival_id)
}

/// Spec §4.8.2: sets the realtime passenger-stop info on a confirmed
/// PASSENGER-stop ARRIVAL and its paired DEPARTURE.
pub fn apply_platform_inference(events: &mut [JourneyEvent], arrival_index: usize, info: PlatformSignalInfo) {
    let stop_info = PassengerStopInfo {
        track: info.track,
        platform: info.platform,
    };
    events[arrival_index].realtime_passenger_stop = Some(stop_info.clone());
    if let Some(next) = events.get_mut(arrival_index + 1) {
        if next.event_type == EventType::Departure {
            next.realtime_passenger_stop = Some(stop_info);
        }
    }
}

fn find_departure_at(events: &[JourneyEvent], point_id: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.point_id == point_id && e.event_type == EventType::Departure)
}

fn find_arrival_at(events: &[JourneyEvent], point_id: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.point_id == point_id && e.event_type == EventType::Arrival)
}

fn find_passenger_arrival_at(events: &[JourneyEvent], point_id: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.point_id == point_id && e.event_type == EventType::Arrival && e.stop_type == StopType::Passenger)
}

/// Applies one dequeued request to one journey's event list (spec §4.8).
/// Point-change requests run their departure half before their arrival
/// half when both are present.
pub async fn apply(
    events: &mut Vec<JourneyEvent>,
    request: &UpdateRequest,
    platform_signals: &dyn PlatformSignalProvider,
) {
    match request {
        UpdateRequest::Removal { .. } => apply_removal(events),
        UpdateRequest::PointChange {
            server_local_time,
            prev_point_id,
            curr_point,
            next_signal_name,
        } => {
            if let Some(prev_point_id) = prev_point_id {
                if let Some(index) = find_departure_at(events, prev_point_id) {
                    confirm_and_repredict(events, index, *server_local_time);
                }
            }

            if let Some(candidate) = curr_point {
                let confirmed_index = match find_arrival_at(events, &candidate.point_id) {
                    Some(index) => {
                        if events[index].realtime_time_type != RealtimeTimeType::Real {
                            confirm_and_repredict(events, index, *server_local_time);
                        }
                        Some(index)
                    }
                    None => maybe_insert_jit(events, candidate, *server_local_time),
                };

                if let (Some(index), Some(signal_name)) = (confirmed_index, next_signal_name) {
                    if events[index].stop_type == StopType::Passenger {
                        if let Some(info) = platform_signals.lookup(&candidate.point_id, signal_name).await {
                            apply_platform_inference(events, index, info);
                        }
                    }
                }
            }
        }
        UpdateRequest::SignalUpdate {
            curr_point_id,
            signal_name,
            ..
        } => {
            if let Some(index) = find_passenger_arrival_at(events, curr_point_id) {
                if let Some(info) = platform_signals.lookup(curr_point_id, signal_name).await {
                    apply_platform_inference(events, index, info);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::ids::{journey_id, server_id};

    fn base_event(journey: model::ids::JourneyId, point_id: &str, event_type: EventType, index: i64, minute: u32) -> JourneyEvent {
        let time = chrono::Local.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap();
        JourneyEvent {
            id: model::ids::journey_event_id(journey, point_id, &time.to_rfc3339(), "X"),
            journey_id: journey,
            event_type,
            event_index: index,
            point_id: point_id.to_string(),
            transport: TransportDescriptor {
                max_speed: 120,
                ..Default::default()
            },
            scheduled_time: time,
            realtime_time: time,
            realtime_time_type: RealtimeTimeType::Schedule,
            stop_type: StopType::None,
            scheduled_passenger_stop: None,
            realtime_passenger_stop: None,
            cancelled: false,
            additional: false,
            in_playable_border: false,
        }
    }

    use chrono::TimeZone;

    #[test]
    fn s2_rounding_29_seconds_floors() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut events = vec![
            base_event(journey, "a", EventType::Departure, 0, 0),
            base_event(journey, "b", EventType::Arrival, 100, 30),
            base_event(journey, "b", EventType::Departure, 101, 30),
        ];
        let confirm_time = chrono::Local.with_ymd_and_hms(2026, 1, 1, 12, 30, 29).unwrap();
        confirm_and_repredict(&mut events, 1, confirm_time);
        assert_eq!(events[2].realtime_time.second(), 0);
        assert_eq!(events[2].realtime_time.minute(), 30);
    }

    #[test]
    fn s2_rounding_30_seconds_ceils() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut events = vec![
            base_event(journey, "a", EventType::Departure, 0, 0),
            base_event(journey, "b", EventType::Arrival, 100, 30),
            base_event(journey, "b", EventType::Departure, 101, 30),
        ];
        let confirm_time = chrono::Local.with_ymd_and_hms(2026, 1, 1, 12, 30, 30).unwrap();
        confirm_and_repredict(&mut events, 1, confirm_time);
        assert_eq!(events[2].realtime_time.minute(), 31);
        assert_eq!(events[2].realtime_time.second(), 0);
    }

    #[test]
    fn s3_technical_stop_absorbs_delay() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut arrival = base_event(journey, "b", EventType::Arrival, 100, 30);
        arrival.stop_type = StopType::Technical;
        let mut departure = base_event(journey, "b", EventType::Departure, 101, 36);
        departure.stop_type = StopType::Technical;
        let mut events = vec![base_event(journey, "a", EventType::Departure, 0, 0), arrival, departure];

        let confirm_time = chrono::Local.with_ymd_and_hms(2026, 1, 1, 12, 34, 0).unwrap(); // 4 min late
        confirm_and_repredict(&mut events, 1, confirm_time);
        assert_eq!(events[2].realtime_time, events[2].scheduled_time);
    }

    #[test]
    fn s4_passenger_stop_floor() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut arrival = base_event(journey, "b", EventType::Arrival, 100, 30);
        arrival.stop_type = StopType::Passenger;
        let mut departure = base_event(journey, "b", EventType::Departure, 101, 35);
        departure.stop_type = StopType::Passenger;
        let mut events = vec![
            base_event(journey, "a", EventType::Departure, 0, 0),
            arrival,
            departure,
        ];

        let confirm_time = chrono::Local.with_ymd_and_hms(2026, 1, 1, 12, 34, 0).unwrap(); // 4 min late
        confirm_and_repredict(&mut events, 1, confirm_time);
        assert_eq!(events[2].realtime_time, events[2].scheduled_time);
    }

    #[test]
    fn removal_cancels_non_real_tail() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut real = base_event(journey, "a", EventType::Departure, 0, 0);
        real.realtime_time_type = RealtimeTimeType::Real;
        let mut events = vec![
            real,
            base_event(journey, "b", EventType::Arrival, 100, 10),
            base_event(journey, "b", EventType::Departure, 101, 10),
        ];
        apply_removal(&mut events);
        assert!(events[1].cancelled);
        assert!(events[2].cancelled);
        assert!(!events[0].cancelled);
    }

    #[test]
    fn s5_jit_insertion_gated_on_prefix_and_reversal() {
        let journey = journey_id(server_id("en1", "x"), "run");
        let mut departed = base_event(journey, "y", EventType::Departure, 0, 0);
        departed.realtime_time_type = RealtimeTimeType::Real;
        let mut events = vec![departed];

        let no_prefix = JitCandidate {
            point_id: "x".to_string(),
            has_schedulable_prefix: false,
            point_max_speed: Some(80),
            in_playable_border: true,
        };
        assert!(maybe_insert_jit(&mut events, &no_prefix, chrono::Local::now()).is_none());

        let candidate = JitCandidate {
            point_id: "x".to_string(),
            has_schedulable_prefix: true,
            point_max_speed: Some(80),
            in_playable_border: true,
        };
        let inserted = maybe_insert_jit(&mut events, &candidate, chrono::Local::now());
        assert!(inserted.is_some());
        assert_eq!(events.len(), 3);
        assert!(events[1].additional);
        assert_eq!(events[1].realtime_time_type, RealtimeTimeType::Real);
        assert_eq!(events[2].realtime_time_type, RealtimeTimeType::Prediction);
    }
}
