use serde::{Deserialize, Serialize};

use crate::dirty::{DirtyField, DirtyGroup};
use crate::dispatch_post::DispatcherUser;
use crate::ids::JourneyId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextSignalInfo {
    pub name: String,
    pub distance_m: u32,
    pub max_speed: Option<u32>,
}

/// Ephemeral per-run state the realtime train collector mutates in place
/// (spec §3 "Journey Update Holder"). Each field is individually dirty
/// tracked; `consume_any_dirty` on `dirty` answers "did anything change
/// since the last publish" in one atomic step.
#[derive(Clone)]
pub struct JourneyUpdateHolder {
    pub upstream_run_id: String,
    pub journey_id: JourneyId,
    pub dirty: DirtyGroup,
    pub speed: DirtyField<u32>,
    pub position: DirtyField<(f64, f64)>,
    pub driver: DirtyField<Option<DispatcherUser>>,
    pub next_signal: DirtyField<Option<NextSignalInfo>>,
    pub next_signal_id: DirtyField<Option<String>>,
}

impl JourneyUpdateHolder {
    pub fn new(upstream_run_id: String, journey_id: JourneyId, lat: f64, lon: f64, speed: u32) -> Self {
        Self {
            upstream_run_id,
            journey_id,
            dirty: DirtyGroup::new(),
            speed: DirtyField::new(speed, 0),
            position: DirtyField::new((lat, lon), 1),
            driver: DirtyField::new(None, 2),
            next_signal: DirtyField::new(None, 3),
            next_signal_id: DirtyField::new(None, 4),
        }
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.speed.set(&self.dirty, speed);
    }

    pub fn set_position(&mut self, lat: f64, lon: f64) {
        self.position.set(&self.dirty, (lat, lon));
    }

    pub fn set_driver(&mut self, driver: Option<DispatcherUser>) {
        self.driver.set(&self.dirty, driver);
    }

    pub fn set_next_signal(&mut self, signal: Option<NextSignalInfo>, signal_id: Option<String>) {
        self.next_signal.set(&self.dirty, signal);
        self.next_signal_id.set(&self.dirty, signal_id);
    }
}

/// Ephemeral per-server bookkeeping for the realtime/dispatch collectors
/// (spec §3 "Server Collector Data").
#[derive(Default, Clone)]
pub struct ServerCollectorData {
    pub trains_etag: Option<String>,
    pub positions_etag: Option<String>,
    /// upstream-train-id -> run-id
    pub train_to_run: std::collections::HashMap<String, String>,
    pub holders: std::collections::HashMap<String, JourneyUpdateHolder>,
}

impl ServerCollectorData {
    pub fn new() -> Self {
        Self::default()
    }
}
