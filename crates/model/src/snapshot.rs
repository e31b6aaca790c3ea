use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch_post::DispatchPost;
use crate::ids::{DispatchPostId, JourneyId, ServerId};
use crate::journey_event::JourneyEvent;
use crate::server::Server;

/// Id holder carried by every snapshot frame: primary data id, owning
/// server, and the entity-kind-specific secondary/foreign id used for
/// disappearance detection (spec §3, §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameId {
    pub primary: String,
    pub server_id: Option<ServerId>,
    pub secondary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyData {
    pub journey_id: JourneyId,
    pub upstream_run_id: String,
    pub server_id: ServerId,
    pub speed: u32,
    pub lat: f64,
    pub lon: f64,
    pub driver: Option<crate::dispatch_post::DispatcherUser>,
    pub current_point_id: Option<String>,
    pub next_signal_id: Option<String>,
    pub events: Vec<JourneyEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnapshotPayload {
    Journey(Box<JourneyData>),
    Server(Box<Server>),
    DispatchPost(Box<DispatchPost>),
}

/// Protocol-buffer-like record (spec §3 "Snapshot frame"): the thing that
/// gets cached and published. `base_timestamp` doubles as a per-key
/// sequence number since ordering across producers is not guaranteed
/// (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFrame {
    pub id: FrameId,
    pub base_timestamp: DateTime<Utc>,
    pub payload: SnapshotPayload,
}

/// A removal carries only the id -- no payload to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalFrame {
    pub id: FrameId,
    pub base_timestamp: DateTime<Utc>,
}

impl SnapshotFrame {
    pub fn secondary_key(&self) -> &str {
        &self.id.secondary
    }

    pub fn primary_key(&self) -> &str {
        &self.id.primary
    }

    pub fn journey_data(&self) -> Option<&JourneyData> {
        match &self.payload {
            SnapshotPayload::Journey(data) => Some(data),
            _ => None,
        }
    }

    pub fn journey_data_mut(&mut self) -> Option<&mut JourneyData> {
        match &mut self.payload {
            SnapshotPayload::Journey(data) => Some(data),
            _ => None,
        }
    }
}

pub fn dispatch_post_secondary_key(server_id: ServerId, upstream_post_id: &str) -> String {
    format!("{}:{}", server_id.raw(), upstream_post_id)
}

pub fn dispatch_post_frame_id(
    id: DispatchPostId,
    server_id: ServerId,
    upstream_post_id: &str,
) -> FrameId {
    FrameId {
        primary: id.raw().to_string(),
        server_id: Some(server_id),
        secondary: dispatch_post_secondary_key(server_id, upstream_post_id),
    }
}
