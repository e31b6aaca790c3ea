//! Timetable collector (spec §4.6). Builds the canonical event list for
//! every run on every known server and reconciles it against what is
//! already durably stored.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveTime;

use model::ids::journey_id;
use model::journey::Journey;
use model::journey_event::JourneyEvent;
use platform::{Collector, Continuation, SupervisionStrategy};
use realtime::timetable::{RunInfo, TimetableEntry, UpstreamStopType};
use upstream::dto::TrainRunEntry;

use crate::CollectorContext;

fn upstream_stop_type(raw: &str) -> UpstreamStopType {
    match raw {
        "PH" => UpstreamStopType::Ph,
        "PT" => UpstreamStopType::Pt,
        _ => UpstreamStopType::None,
    }
}

fn parse_local_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S").ok()
}

fn to_entries(run: &TrainRunEntry) -> Vec<TimetableEntry> {
    run.timetable
        .iter()
        .map(|e| TimetableEntry {
            point_upstream_id: e.point_id.clone(),
            arrival_local: e.arrival_time.as_deref().and_then(parse_local_time),
            departure_local: e.departure_time.as_deref().and_then(parse_local_time),
            stop_type: upstream_stop_type(&e.stop_type),
            track: e.track.clone(),
            platform: e.platform.clone(),
            max_speed: e.max_speed,
        })
        .collect()
}

fn run_info(run: &TrainRunEntry) -> Option<RunInfo> {
    let first = run.timetable.first()?;
    Some(RunInfo {
        display_name: run.train_no_local.clone(),
        train_number: first.train_number.clone(),
        transport_type: first.train_type.clone(),
    })
}

/// Spec §4.6 step 5: compare by size and by scheduled-data-only equality,
/// ignoring realtime/cancellation state that only the updater owns.
fn scheduled_equal(existing: &[JourneyEvent], built: &[JourneyEvent]) -> bool {
    if existing.len() != built.len() {
        return false;
    }
    existing.iter().zip(built.iter()).all(|(a, b)| {
        a.point_id == b.point_id
            && a.event_type == b.event_type
            && a.event_index == b.event_index
            && a.scheduled_time == b.scheduled_time
            && a.stop_type == b.stop_type
            && a.transport == b.transport
            && a.scheduled_passenger_stop == b.scheduled_passenger_stop
            && a.in_playable_border == b.in_playable_border
    })
}

#[derive(Default, Clone)]
pub struct TimetableCollectorState {
    started: bool,
}

pub struct TimetableCollector;

#[async_trait]
impl Collector for TimetableCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = TimetableCollectorState;

    fn unique_id() -> &'static str {
        "timetable-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(15 * 60))
    }

    async fn run(
        &mut self,
        context: &Self::Context,
        mut state: Self::State,
    ) -> Result<(Continuation, Self::State), Self::Error> {
        if !state.started {
            tokio::time::sleep(Duration::from_secs(30)).await;
            state.started = true;
        }

        let servers = context.platform.servers.snapshot();
        for frame in &servers {
            let model::snapshot::SnapshotPayload::Server(server) = &frame.payload else {
                continue;
            };
            let server = server.as_ref();
            if server.deleted {
                continue;
            }

            let Some(runs) = context.aws.train_runs(&server.code).await else {
                continue;
            };

            for run in &runs {
                let Some(info) = run_info(run) else { continue };
                let entries = to_entries(run);
                if entries.is_empty() {
                    continue;
                }

                let jid = journey_id(server.id, &run.run_id);
                let events = realtime::build_events(
                    jid,
                    &entries,
                    &info,
                    server.utc_offset_seconds,
                    context.points.as_ref(),
                    context.borders.as_ref(),
                )
                .await;
                if events.is_empty() {
                    continue;
                }

                let existing = context
                    .platform
                    .db
                    .journey_by_server_and_run(server.id, &run.run_id)
                    .await
                    .ok()
                    .flatten();

                match existing {
                    None => {
                        let journey = Journey::new(jid, run.run_id.clone(), server.id);
                        if let Err(why) = context.platform.db.insert_journey_if_absent(&journey).await {
                            tracing::error!(run_id = %run.run_id, error = %why, "failed inserting journey");
                            continue;
                        }
                        if let Err(why) = context.platform.db.replace_events(jid, &events).await {
                            tracing::error!(run_id = %run.run_id, error = %why, "failed storing timetable events");
                        }
                    }
                    Some(journey) if journey.id != jid => {
                        // Train number changed under the same run-id: the upstream
                        // run now hashes to a different stable id. Wipe the old
                        // journey outright before inserting the new one.
                        if let Err(why) = context.platform.db.wipe_journey(journey.id).await {
                            tracing::error!(run_id = %run.run_id, error = %why, "failed wiping superseded journey");
                            continue;
                        }
                        let journey = Journey::new(jid, run.run_id.clone(), server.id);
                        if let Err(why) = context.platform.db.insert_journey_if_absent(&journey).await {
                            tracing::error!(run_id = %run.run_id, error = %why, "failed inserting journey");
                            continue;
                        }
                        if let Err(why) = context.platform.db.replace_events(jid, &events).await {
                            tracing::error!(run_id = %run.run_id, error = %why, "failed storing timetable events");
                        }
                    }
                    Some(journey) if journey.first_seen_at.is_some() => {
                        // Already running; the realtime updater owns these events now.
                        continue;
                    }
                    Some(_) => {
                        let existing_events = context
                            .platform
                            .db
                            .events_for_journey(jid)
                            .await
                            .unwrap_or_default();
                        if !scheduled_equal(&existing_events, &events) {
                            if let Err(why) = context.platform.db.replace_events(jid, &events).await {
                                tracing::error!(run_id = %run.run_id, error = %why, "failed replacing timetable events");
                            }
                        }
                    }
                }
            }
        }

        Ok((Continuation::Continue, state))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_type_maps_known_tokens() {
        assert_eq!(upstream_stop_type("PH"), UpstreamStopType::Ph);
        assert_eq!(upstream_stop_type("PT"), UpstreamStopType::Pt);
        assert_eq!(upstream_stop_type("other"), UpstreamStopType::None);
    }

    #[test]
    fn parses_hh_mm_ss() {
        assert_eq!(parse_local_time("08:15:00"), NaiveTime::from_hms_opt(8, 15, 0));
        assert!(parse_local_time("bogus").is_none());
    }
}
