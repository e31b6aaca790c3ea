//! Canonical event-list construction from a raw upstream timetable (spec
//! §4.6.1).

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, TimeZone};

use model::ids::{journey_event_id, JourneyId};
use model::journey_event::{
    EventType, JourneyEvent, PassengerStopInfo, RealtimeTimeType, StopType, TransportDescriptor,
};
use reference::border::BorderPointProvider;
use reference::point::{Point, PointProvider};

use crate::transport_name;

/// Upstream stop-type tag, ordered `None < Pt < Ph` per spec §4.6.1 step 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpstreamStopType {
    None,
    Pt,
    Ph,
}

impl UpstreamStopType {
    fn into_model(self) -> StopType {
        match self {
            UpstreamStopType::None => StopType::None,
            UpstreamStopType::Pt => StopType::Technical,
            UpstreamStopType::Ph => StopType::Passenger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimetableEntry {
    pub point_upstream_id: String,
    pub arrival_local: Option<NaiveTime>,
    pub departure_local: Option<NaiveTime>,
    pub stop_type: UpstreamStopType,
    pub track: Option<String>,
    pub platform: Option<String>,
    pub max_speed: u32,
}

#[derive(Debug, Clone)]
pub struct RunInfo {
    pub display_name: String,
    pub train_number: String,
    pub transport_type: String,
}

struct FixupEntry {
    upstream_point_id: String,
    resolved: Option<Point>,
    entry: TimetableEntry,
}

async fn fixup_and_merge(entries: &[TimetableEntry], points: &dyn PointProvider) -> Vec<FixupEntry> {
    let mut fixed: Vec<FixupEntry> = Vec::new();
    let mut seen_known_ids: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let resolved = points.by_id(&entry.point_upstream_id).await;

        if i == 0 {
            if let Some(point) = &resolved {
                seen_known_ids.insert(point.id.clone());
            }
            fixed.push(FixupEntry {
                upstream_point_id: entry.point_upstream_id.clone(),
                resolved,
                entry: entry.clone(),
            });
            continue;
        }

        let Some(point) = resolved else {
            // Unknown point: retained, dropped during emission (spec §4.6.1 step 3).
            fixed.push(FixupEntry {
                upstream_point_id: entry.point_upstream_id.clone(),
                resolved: None,
                entry: entry.clone(),
            });
            continue;
        };

        let tail_matches = fixed
            .last()
            .map(|tail| {
                tail.upstream_point_id == point.id
                    || point.sim_rail_point_ids.iter().any(|alias| *alias == tail.upstream_point_id)
            })
            .unwrap_or(false);

        if tail_matches {
            let tail = fixed.last_mut().expect("checked above");
            tail.entry.max_speed = tail.entry.max_speed.max(entry.max_speed);
            tail.entry.departure_local = entry.departure_local;
            if entry.stop_type > tail.entry.stop_type {
                tail.entry.stop_type = entry.stop_type;
                tail.entry.track = entry.track.clone();
                tail.entry.platform = entry.platform.clone();
            }
            continue;
        }

        if seen_known_ids.contains(&point.id) {
            continue;
        }
        seen_known_ids.insert(point.id.clone());
        fixed.push(FixupEntry {
            upstream_point_id: entry.point_upstream_id.clone(),
            resolved: Some(point),
            entry: entry.clone(),
        });
    }

    fixed
}

/// Spec §4.6.1 step 2: the required-next-points variant is authoritative;
/// a border point without one falls back to a plain entry/exit toggle.
async fn playable_border_flags(fixed: &[FixupEntry], borders: &dyn BorderPointProvider) -> Vec<bool> {
    let mut flags = Vec::with_capacity(fixed.len());
    let mut in_border = false;

    for (i, item) in fixed.iter().enumerate() {
        flags.push(in_border);

        let Some(point) = &item.resolved else {
            continue;
        };
        let Some(border) = borders.by_id(&point.id).await else {
            continue;
        };

        if !in_border {
            let can_enter = match &border.required_next_point_ids {
                Some(required) => fixed
                    .get(i + 1)
                    .and_then(|next| next.resolved.as_ref())
                    .map(|next_point| required.iter().any(|id| *id == next_point.id))
                    .unwrap_or(false),
                None => true,
            };
            if can_enter {
                in_border = true;
            }
        } else {
            in_border = false;
        }
    }

    flags
}

struct ProducedEvent {
    event_type: EventType,
    point_id: String,
    scheduled: DateTime<Local>,
    stop_type: StopType,
    track: Option<String>,
    platform: Option<String>,
    max_speed: u32,
    in_border: bool,
}

fn clock_delta(previous: NaiveTime, current: NaiveTime) -> Duration {
    let delta = current - previous;
    if delta < Duration::zero() {
        delta + Duration::hours(24)
    } else {
        delta
    }
}

fn local_from_clock(base: chrono::NaiveDate, clock: NaiveTime, utc_offset_seconds: i32) -> DateTime<Local> {
    let naive = base.and_time(clock);
    let offset = FixedOffset::east_opt(utc_offset_seconds).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let server_instant = offset.from_local_datetime(&naive).earliest().unwrap_or_else(|| {
        offset.from_utc_datetime(&naive)
    });
    server_instant.with_timezone(&Local)
}

fn passenger_stop(stop_type: StopType, track: &Option<String>, platform: &Option<String>) -> Option<PassengerStopInfo> {
    if stop_type != StopType::Passenger {
        return None;
    }
    match (track, platform) {
        (Some(track), Some(platform)) => Some(PassengerStopInfo {
            track: track.clone(),
            platform: platform.clone(),
        }),
        _ => None,
    }
}

/// Builds the canonical event list for one run (spec §4.6.1, steps 1-5).
pub async fn build_events(
    journey_id: JourneyId,
    entries: &[TimetableEntry],
    run: &RunInfo,
    utc_offset_seconds: i32,
    points: &dyn PointProvider,
    borders: &dyn BorderPointProvider,
) -> Vec<JourneyEvent> {
    let fixed = fixup_and_merge(entries, points).await;
    if fixed.is_empty() {
        return Vec::new();
    }
    let border_flags = playable_border_flags(&fixed, borders).await;

    let parsed_name = transport_name::parse(&run.display_name);
    let retains_line = transport_name::retains_line(&run.transport_type);

    let base_date = Local::now().date_naive();
    let mut produced: Vec<ProducedEvent> = Vec::new();
    let mut previous_clock: Option<NaiveTime> = None;
    let mut previous_timestamp: Option<DateTime<Local>> = None;

    let last_known_index = fixed.iter().rposition(|item| item.resolved.is_some());

    for (i, item) in fixed.iter().enumerate() {
        if item.resolved.is_none() {
            continue;
        }
        let is_first = i == 0;
        let is_last = Some(i) == last_known_index;
        let in_border = border_flags[i];

        let mut emit = |event_type: EventType, clock: Option<NaiveTime>| -> Option<()> {
            let clock = clock?;
            let timestamp = match (previous_clock, previous_timestamp) {
                (Some(prev_clock), Some(prev_ts)) => prev_ts + clock_delta(prev_clock, clock),
                _ => local_from_clock(base_date, clock, utc_offset_seconds),
            };
            previous_clock = Some(clock);
            previous_timestamp = Some(timestamp);

            produced.push(ProducedEvent {
                event_type,
                point_id: item.resolved.as_ref().unwrap().id.clone(),
                scheduled: timestamp,
                stop_type: item.entry.stop_type.into_model(),
                track: item.entry.track.clone(),
                platform: item.entry.platform.clone(),
                max_speed: item.entry.max_speed,
                in_border,
            });

            if event_type == EventType::Departure && produced.len() >= 2 {
                let len = produced.len();
                let arrival_scheduled = produced[len - 2].scheduled;
                let departure_scheduled = produced[len - 1].scheduled;
                let arrival_stop = produced[len - 2].stop_type;
                let upstream_stop = item.entry.stop_type;

                if arrival_scheduled != departure_scheduled
                    && arrival_stop == StopType::None
                    && produced[len - 1].stop_type == StopType::None
                {
                    produced[len - 2].stop_type = StopType::Technical;
                    produced[len - 1].stop_type = StopType::Technical;
                } else if upstream_stop == UpstreamStopType::Ph && arrival_scheduled == departure_scheduled {
                    produced[len - 1].scheduled += Duration::seconds(30);
                } else if arrival_scheduled == departure_scheduled && produced[len - 1].stop_type != StopType::Passenger {
                    produced[len - 2].stop_type = StopType::None;
                    produced[len - 1].stop_type = StopType::None;
                }
            }
            Some(())
        };

        if !is_first {
            emit(EventType::Arrival, item.entry.arrival_local);
        }
        if !is_last {
            emit(EventType::Departure, item.entry.departure_local);
        }
    }

    // Step 4: head/tail cleanup.
    if let Some(first) = produced.first() {
        if first.event_type == EventType::Arrival {
            let dropped_stop = first.stop_type;
            produced.remove(0);
            if let Some(new_head) = produced.first_mut() {
                if dropped_stop == StopType::Technical {
                    new_head.stop_type = StopType::None;
                }
            }
        }
    }
    if let Some(last) = produced.last() {
        if last.event_type == EventType::Departure {
            let dropped_stop = last.stop_type;
            produced.pop();
            if let Some(new_tail) = produced.last_mut() {
                if dropped_stop == StopType::Technical {
                    new_tail.stop_type = StopType::None;
                }
            }
        }
    }

    // Step 5: indexing.
    let mut indices = vec![0i64; produced.len()];
    if !indices.is_empty() {
        indices[0] = 0;
        let mut pair = 1i64;
        let mut j = 1usize;
        while j < produced.len() {
            indices[j] = pair * 100;
            j += 1;
            if j < produced.len() && produced[j].event_type == EventType::Departure {
                indices[j] = pair * 100 + 1;
                j += 1;
            }
            pair += 1;
        }
    }

    produced
        .into_iter()
        .zip(indices)
        .map(|(event, index)| {
            let transport = TransportDescriptor {
                category: parsed_name.category.clone(),
                number: run.train_number.clone(),
                transport_type: run.transport_type.clone(),
                line: if retains_line { parsed_name.line.clone() } else { None },
                label: parsed_name.label.clone(),
                max_speed: event.max_speed,
            };
            let scheduled_passenger_stop = passenger_stop(event.stop_type, &event.track, &event.platform);
            let event_type_tag = match event.event_type {
                EventType::Arrival => "ARRIVAL",
                EventType::Departure => "DEPARTURE",
            };
            let id = journey_event_id(
                journey_id,
                &event.point_id,
                &event.scheduled.to_rfc3339(),
                event_type_tag,
            );
            JourneyEvent {
                id,
                journey_id,
                event_type: event.event_type,
                event_index: index,
                point_id: event.point_id,
                transport,
                scheduled_time: event.scheduled,
                realtime_time: event.scheduled,
                realtime_time_type: RealtimeTimeType::Schedule,
                stop_type: event.stop_type,
                scheduled_passenger_stop,
                realtime_passenger_stop: None,
                cancelled: false,
                additional: false,
                in_playable_border: event.in_border,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reference::border::{BorderPoint, InMemoryBorderPointProvider};
    use reference::point::InMemoryPointProvider;
    use utility::geo::BoundingBox;

    fn point(id: &str) -> Point {
        Point {
            id: id.to_string(),
            name: id.to_string(),
            sim_rail_point_ids: vec![],
            bounds: BoundingBox::around(50.0, 19.0, 0.1),
            has_schedulable_prefix: true,
        }
    }

    fn entry(point_id: &str, arrival: Option<(u32, u32)>, departure: Option<(u32, u32)>) -> TimetableEntry {
        TimetableEntry {
            point_upstream_id: point_id.to_string(),
            arrival_local: arrival.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            departure_local: departure.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            stop_type: UpstreamStopType::None,
            track: None,
            platform: None,
            max_speed: 120,
        }
    }

    #[tokio::test]
    async fn border_traversal_matches_s1() {
        let points = InMemoryPointProvider::new(vec![
            point("a"),
            point("b"),
            point("c"),
            point("d"),
            point("e"),
        ]);
        let borders = InMemoryBorderPointProvider::new(vec![
            BorderPoint {
                point_id: "b".to_string(),
                required_next_point_ids: Some(vec!["c".to_string()]),
            },
            BorderPoint {
                point_id: "d".to_string(),
                required_next_point_ids: None,
            },
        ]);
        let entries = vec![
            entry("a", None, Some((10, 0))),
            entry("b", Some((10, 10)), Some((10, 11))),
            entry("c", Some((10, 20)), Some((10, 21))),
            entry("d", Some((10, 30)), Some((10, 31))),
            entry("e", Some((10, 40)), None),
        ];
        let run = RunInfo {
            display_name: "REG".to_string(),
            train_number: "1".to_string(),
            transport_type: "REGIONAL_TRAIN".to_string(),
        };
        let journey_id = model::ids::journey_id(model::ids::server_id("en1", "x"), "run-1");
        let events = build_events(journey_id, &entries, &run, 0, &points, &borders).await;

        let border_for = |point_id: &str| {
            events
                .iter()
                .find(|e| e.point_id == point_id)
                .map(|e| e.in_playable_border)
        };
        assert_eq!(border_for("a"), Some(false));
        assert_eq!(border_for("b"), Some(false));
        assert_eq!(border_for("c"), Some(true));
        assert_eq!(border_for("d"), Some(true));
        assert_eq!(border_for("e"), Some(false));
    }

    #[tokio::test]
    async fn event_list_starts_with_departure_and_ends_with_arrival() {
        let points = InMemoryPointProvider::new(vec![point("a"), point("b"), point("c")]);
        let borders = InMemoryBorderPointProvider::new(vec![]);
        let entries = vec![
            entry("a", None, Some((8, 0))),
            entry("b", Some((8, 10)), Some((8, 10))),
            entry("c", Some((8, 20)), None),
        ];
        let run = RunInfo {
            display_name: "IC".to_string(),
            train_number: "2".to_string(),
            transport_type: "INTERCITY".to_string(),
        };
        let journey_id = model::ids::journey_id(model::ids::server_id("en1", "x"), "run-2");
        let events = build_events(journey_id, &entries, &run, 0, &points, &borders).await;

        assert_eq!(events.first().unwrap().event_type, EventType::Departure);
        assert_eq!(events.last().unwrap().event_type, EventType::Arrival);
        for pair in events.windows(2) {
            assert!(pair[0].event_index < pair[1].event_index);
        }
    }
}
