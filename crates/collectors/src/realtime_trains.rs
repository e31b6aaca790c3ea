//! Realtime train collector (spec §4.7). Fans one cycle per known, online
//! server out onto a bounded worker pool; every detected point or signal
//! transition is handed to the realtime-event-updater's single-writer queue
//! rather than applied here directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Local, Utc};
use tokio::sync::Mutex;

use actors::worker_pool::{CycleLatch, WorkerPool};
use model::dispatch_post::{DispatcherUser, UserPlatform};
use model::ids::{journey_id, ServerId};
use model::server::Server;
use model::snapshot::{FrameId, JourneyData, SnapshotFrame, SnapshotPayload};
use model::update_holder::{JourneyUpdateHolder, NextSignalInfo, ServerCollectorData};
use platform::{Collector, Continuation, SupervisionStrategy};
use realtime::{JitCandidate, UpdateRequest};
use upstream::client::ConditionalResponse;
use upstream::dto::{PositionEntry, TrainDataEntry, TrainEntry};

use crate::updater_actor::UpdaterMessage;
use crate::CollectorContext;

const WORKER_POOL_CAPACITY: usize = 24;
const LATCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Upstream's "no signal ahead" sentinel, along with anything implausibly
/// fast, is dropped rather than surfaced (spec §4.7).
const MAX_PLAUSIBLE_SIGNAL_SPEED: u32 = 500;

fn speed_of(velocity: f64) -> u32 {
    velocity.round().max(0.0) as u32
}

fn driver_from(data: &TrainDataEntry) -> Option<DispatcherUser> {
    if let Some(steam) = &data.controlled_by_steam_id {
        Some(DispatcherUser {
            platform: UserPlatform::Steam,
            platform_id: steam.clone(),
        })
    } else if let Some(xbox) = &data.controlled_by_xbox_id {
        Some(DispatcherUser {
            platform: UserPlatform::Xbox,
            platform_id: xbox.clone(),
        })
    } else {
        None
    }
}

fn next_signal_of(data: &TrainDataEntry) -> (Option<NextSignalInfo>, Option<String>) {
    let Some(raw) = &data.signal_in_front else {
        return (None, None);
    };
    let name = raw.split('@').next().unwrap_or(raw).to_string();
    let distance_m = data
        .distance_to_signal_in_front
        .map(|d| ((d / 10.0).round() * 10.0) as u32)
        .unwrap_or(0);
    let max_speed = data.signal_in_front_speed.filter(|&v| v < MAX_PLAUSIBLE_SIGNAL_SPEED);
    let id = name.clone();
    (Some(NextSignalInfo { name, distance_m, max_speed }), Some(id))
}

/// Spec §6: the server's own clock, approximated by applying its stored UTC
/// offset to the current instant. Stored as `Local` for consistency with
/// every other server-local timestamp in this codebase.
fn server_local_now(server: &Server) -> chrono::DateTime<Local> {
    let offset = FixedOffset::east_opt(server.utc_offset_seconds).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    Utc::now().with_timezone(&offset).with_timezone(&Local)
}

fn ingest_trains(data: &mut ServerCollectorData, server: &Server, trains: &[TrainEntry]) {
    for train in trains {
        data.train_to_run.insert(train.id.clone(), train.run_id.clone());

        if !data.holders.contains_key(&train.run_id) {
            let (Some(lat), Some(lon)) = (train.train_data.latitude, train.train_data.longitude) else {
                continue;
            };
            let jid = journey_id(server.id, &train.run_id);
            data.holders.insert(
                train.run_id.clone(),
                JourneyUpdateHolder::new(train.run_id.clone(), jid, lat, lon, speed_of(train.train_data.velocity)),
            );
        }

        if let Some(holder) = data.holders.get_mut(&train.run_id) {
            holder.set_driver(driver_from(&train.train_data));
            let (signal, signal_id) = next_signal_of(&train.train_data);
            holder.set_next_signal(signal, signal_id);
        }
    }
}

fn ingest_positions(data: &mut ServerCollectorData, positions: &[PositionEntry]) {
    for position in positions {
        if let Some(holder) = data.holders.get_mut(&position.run_id) {
            holder.set_speed(speed_of(position.velocity));
            holder.set_position(position.lat, position.lon);
        }
    }
}

fn blank_journey_frame(server: &Server, holder: &JourneyUpdateHolder) -> SnapshotFrame {
    SnapshotFrame {
        id: FrameId {
            primary: holder.journey_id.raw().to_string(),
            server_id: Some(server.id),
            secondary: format!("{}:{}", server.id.raw(), holder.upstream_run_id),
        },
        base_timestamp: Utc::now(),
        payload: SnapshotPayload::Journey(Box::new(JourneyData {
            journey_id: holder.journey_id,
            upstream_run_id: holder.upstream_run_id.clone(),
            server_id: server.id,
            speed: 0,
            lat: 0.0,
            lon: 0.0,
            driver: None,
            current_point_id: None,
            next_signal_id: None,
            events: Vec::new(),
        })),
    }
}

async fn publish_dirty_journeys(context: &CollectorContext, server: &Server, data: &mut ServerCollectorData) {
    for holder in data.holders.values_mut() {
        if !holder.dirty.consume_any_dirty() {
            continue;
        }

        let mut frame = context
            .platform
            .journeys
            .find_by_primary(&holder.journey_id.raw().to_string())
            .unwrap_or_else(|| blank_journey_frame(server, holder));
        frame.base_timestamp = Utc::now();

        let prev_point_id = frame.journey_data().and_then(|d| d.current_point_id.clone());
        let prev_signal_id = frame.journey_data().and_then(|d| d.next_signal_id.clone());
        let (lat, lon) = *holder.position.get();
        let point = context.points.containing(lat, lon).await;
        let point_id = point.as_ref().map(|p| p.id.clone());
        let next_signal_id = holder.next_signal_id.get().clone();

        if let Some(journey_data) = frame.journey_data_mut() {
            journey_data.speed = *holder.speed.get();
            journey_data.lat = lat;
            journey_data.lon = lon;
            journey_data.driver = holder.driver.get().clone();
            journey_data.current_point_id = point_id.clone();
            journey_data.next_signal_id = next_signal_id.clone();
        }

        let server_local_time = server_local_now(server);
        let next_signal_name = holder.next_signal.get().as_ref().map(|s| s.name.clone());

        if point_id != prev_point_id {
            if prev_point_id.is_none() {
                if let Err(why) = context.platform.db.mark_journey_first_seen(holder.journey_id).await {
                    tracing::error!(error = %why, "failed marking journey first seen");
                }
            }

            let candidate = point.as_ref().map(|p| JitCandidate {
                point_id: p.id.clone(),
                has_schedulable_prefix: p.has_schedulable_prefix,
                point_max_speed: None,
                in_playable_border: false,
            });
            let request = UpdateRequest::PointChange {
                server_local_time,
                prev_point_id,
                curr_point: candidate,
                next_signal_name,
            };
            let _ = context
                .updater
                .tell(UpdaterMessage { journey_id: holder.journey_id, request })
                .await;
        } else if next_signal_id != prev_signal_id {
            if let (Some(point_id), Some(signal_name)) = (point_id.clone(), next_signal_name) {
                let request = UpdateRequest::SignalUpdate {
                    server_local_time,
                    curr_point_id: point_id,
                    signal_name,
                };
                let _ = context
                    .updater
                    .tell(UpdaterMessage { journey_id: holder.journey_id, request })
                    .await;
            }
        }

        if let Err(why) = context.platform.publish_journey_update(frame).await {
            tracing::error!(error = %why, "failed publishing journey update");
        }
    }
}

async fn reconcile_disappearances(
    context: &CollectorContext,
    server: &Server,
    data: &mut ServerCollectorData,
    seen_run_ids: &HashSet<String>,
) {
    let known_secondary_keys: HashSet<String> = seen_run_ids
        .iter()
        .map(|run_id| format!("{}:{}", server.id.raw(), run_id))
        .collect();

    for frame in context.platform.journeys.find_by_secondary_not_in(&known_secondary_keys) {
        let Some(journey_data) = frame.journey_data() else { continue };
        if journey_data.server_id != server.id {
            continue;
        }
        let journey_id = journey_data.journey_id;
        let upstream_run_id = journey_data.upstream_run_id.clone();

        if let Err(why) = context.platform.db.mark_journey_last_seen(journey_id).await {
            tracing::error!(error = %why, "failed marking journey last seen");
        }

        let request = UpdateRequest::Removal {
            server_local_time: server_local_now(server),
        };
        let _ = context.updater.tell(UpdaterMessage { journey_id, request }).await;

        if let Err(why) = context
            .platform
            .publish_journey_removal(frame.primary_key(), server.id, journey_id)
            .await
        {
            tracing::error!(error = %why, "failed publishing journey removal");
        }

        data.holders.remove(&upstream_run_id);
        data.train_to_run.retain(|_, run_id| *run_id != upstream_run_id);
    }
}

async fn process_server(context: CollectorContext, server: Server, data: Arc<Mutex<ServerCollectorData>>) {
    let mut data = data.lock().await;

    match context.panel.trains(&server.code, data.trains_etag.as_deref()).await {
        ConditionalResponse::Fresh { body, etag } => {
            data.trains_etag = etag;
            ingest_trains(&mut data, &server, &body);
        }
        ConditionalResponse::NotModified => {}
    }

    match context.panel.positions(&server.code, data.positions_etag.as_deref()).await {
        ConditionalResponse::Fresh { body, etag } => {
            data.positions_etag = etag;
            ingest_positions(&mut data, &body);
        }
        ConditionalResponse::NotModified => {}
    }

    publish_dirty_journeys(&context, &server, &mut data).await;

    let seen_run_ids: HashSet<String> = data.train_to_run.values().cloned().collect();
    reconcile_disappearances(&context, &server, &mut data, &seen_run_ids).await;
}

#[derive(Default, Clone)]
pub struct RealtimeTrainsState {
    per_server: HashMap<ServerId, Arc<Mutex<ServerCollectorData>>>,
}

pub struct RealtimeTrainsCollector {
    pool: WorkerPool,
}

impl RealtimeTrainsCollector {
    pub fn new() -> Self {
        Self {
            pool: WorkerPool::new(WORKER_POOL_CAPACITY),
        }
    }
}

impl Default for RealtimeTrainsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for RealtimeTrainsCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = RealtimeTrainsState;

    fn unique_id() -> &'static str {
        "realtime-trains-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(2))
    }

    async fn run(
        &mut self,
        context: &Self::Context,
        mut state: Self::State,
    ) -> Result<(Continuation, Self::State), Self::Error> {
        let servers: Vec<Server> = context
            .platform
            .servers
            .snapshot()
            .into_iter()
            .filter_map(|frame| match frame.payload {
                SnapshotPayload::Server(server) => Some(*server),
                _ => None,
            })
            .filter(|server| !server.deleted && server.online)
            .collect();

        let live_ids: HashSet<ServerId> = servers.iter().map(|s| s.id).collect();
        state.per_server.retain(|id, _| live_ids.contains(id));

        let latch = CycleLatch::new(servers.len());
        for server in servers {
            let data = state
                .per_server
                .entry(server.id)
                .or_insert_with(|| Arc::new(Mutex::new(ServerCollectorData::new())))
                .clone();
            let context = context.clone();
            self.pool.submit(latch.clone(), move || process_server(context, server, data));
        }
        latch.wait(LATCH_TIMEOUT).await;

        Ok((Continuation::Continue, state))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_data(lat: Option<f64>, lon: Option<f64>) -> TrainDataEntry {
        TrainDataEntry {
            velocity: 42.6,
            latitude: lat,
            longitude: lon,
            controlled_by_steam_id: Some("76500000000000001".to_string()),
            controlled_by_xbox_id: None,
            signal_in_front: Some("L501_G@-500".to_string()),
            distance_to_signal_in_front: Some(487.0),
            signal_in_front_speed: Some(32767),
        }
    }

    fn sample_server() -> Server {
        Server {
            id: model::ids::server_id("en1", "srv1"),
            upstream_id: "srv1".to_string(),
            code: "en1".to_string(),
            region: model::server::Region::Europe,
            language: None,
            tags: vec![],
            online: true,
            scenery: "default".to_string(),
            utc_offset_seconds: 0,
            registered_at: Utc::now(),
            deleted: false,
        }
    }

    #[test]
    fn holder_creation_skips_runs_with_null_position() {
        let server = sample_server();
        let mut data = ServerCollectorData::new();
        let train = TrainEntry {
            id: "t1".to_string(),
            run_id: "run-1".to_string(),
            train_no_local: "1".to_string(),
            train_name: "IC".to_string(),
            vehicles: vec![],
            train_data: train_data(None, None),
        };
        ingest_trains(&mut data, &server, &[train]);
        assert!(data.holders.is_empty());
        assert_eq!(data.train_to_run.get("t1").map(String::as_str), Some("run-1"));
    }

    #[test]
    fn holder_creation_succeeds_with_position_and_truncates_signal_name() {
        let server = sample_server();
        let mut data = ServerCollectorData::new();
        let train = TrainEntry {
            id: "t1".to_string(),
            run_id: "run-1".to_string(),
            train_no_local: "1".to_string(),
            train_name: "IC".to_string(),
            vehicles: vec![],
            train_data: train_data(Some(50.0), Some(19.0)),
        };
        ingest_trains(&mut data, &server, &[train]);
        let holder = data.holders.get("run-1").unwrap();
        assert_eq!(holder.next_signal_id.get().as_deref(), Some("L501_G"));
        assert!(holder.next_signal.get().as_ref().unwrap().max_speed.is_none());
        assert!(holder.driver.get().is_some());
    }

    #[test]
    fn positions_update_existing_holder_only() {
        let server = sample_server();
        let mut data = ServerCollectorData::new();
        let jid = journey_id(server.id, "run-1");
        data.holders.insert("run-1".to_string(), JourneyUpdateHolder::new("run-1".to_string(), jid, 50.0, 19.0, 0));
        ingest_positions(&mut data, &[PositionEntry { run_id: "run-1".to_string(), velocity: 88.4, lat: 50.1, lon: 19.1 }]);
        let holder = data.holders.get("run-1").unwrap();
        assert_eq!(*holder.speed.get(), 88);
        assert_eq!(*holder.position.get(), (50.1, 19.1));

        ingest_positions(&mut data, &[PositionEntry { run_id: "unknown".to_string(), velocity: 10.0, lat: 0.0, lon: 0.0 }]);
        assert_eq!(data.holders.len(), 1);
    }
}
