//! Generated protobuf types and their conversions to/from the domain model
//! (spec §3 "Protocol-buffer-like record", mirroring the `gtfs` crate's
//! `prost`/`prost-types` use for its own realtime feed).

#![allow(clippy::all)]
include!(concat!(env!("OUT_DIR"), "/simrail.eventbus.rs"));

use model::dispatch_post::{DispatcherUser, UserPlatform};
use model::ids::ServerId;
use model::server::{Region, Server};
use model::snapshot::{FrameId as ModelFrameId, SnapshotFrame, SnapshotPayload};

impl From<&ModelFrameId> for FrameId {
    fn from(id: &ModelFrameId) -> Self {
        FrameId {
            primary: id.primary.clone(),
            server_id: id.server_id.map(|s| s.raw().to_string()),
            secondary: id.secondary.clone(),
        }
    }
}

fn region_tag(region: Region) -> &'static str {
    match region {
        Region::Asia => "ASIA",
        Region::Europe => "EUROPE",
        Region::UsNorth => "US_NORTH",
    }
}

impl From<&Server> for ServerData {
    fn from(server: &Server) -> Self {
        ServerData {
            upstream_id: server.upstream_id.clone(),
            code: server.code.clone(),
            region: region_tag(server.region).to_string(),
            language: server.language.clone(),
            tags: server.tags.clone(),
            online: server.online,
            scenery: server.scenery.clone(),
            utc_offset_seconds: server.utc_offset_seconds,
            registered_at_epoch_ms: server.registered_at.timestamp_millis(),
            deleted: server.deleted,
        }
    }
}

fn platform_tag(platform: UserPlatform) -> &'static str {
    match platform {
        UserPlatform::Steam => "STEAM",
        UserPlatform::Xbox => "XBOX",
    }
}

impl From<&model::snapshot::JourneyData> for JourneyData {
    fn from(data: &model::snapshot::JourneyData) -> Self {
        JourneyData {
            upstream_run_id: data.upstream_run_id.clone(),
            server_id: data.server_id.raw().to_string(),
            speed: data.speed,
            lat: data.lat,
            lon: data.lon,
            driver_platform: data
                .driver
                .as_ref()
                .map(|d| platform_tag(d.platform).to_string()),
            driver_platform_id: data.driver.as_ref().map(|d| d.platform_id.clone()),
            current_point_id: data.current_point_id.clone(),
            next_signal_id: data.next_signal_id.clone(),
        }
    }
}

impl From<&model::dispatch_post::DispatchPost> for DispatchPostData {
    fn from(post: &model::dispatch_post::DispatchPost) -> Self {
        DispatchPostData {
            upstream_id: post.upstream_id.clone(),
            server_id: post.server_id.raw().to_string(),
            name: post.name.clone(),
            difficulty_level: post.difficulty_level as u32,
            lat: post.lat,
            lon: post.lon,
            point_id: post.point_id.clone(),
            image_urls: post.image_urls.clone(),
            deleted: post.deleted,
        }
    }
}

impl From<&SnapshotFrame> for UpdateFrame {
    fn from(frame: &SnapshotFrame) -> Self {
        let payload = match &frame.payload {
            SnapshotPayload::Server(server) => update_frame::Payload::Server(server.as_ref().into()),
            SnapshotPayload::Journey(journey) => {
                update_frame::Payload::Journey(journey.as_ref().into())
            }
            SnapshotPayload::DispatchPost(post) => {
                update_frame::Payload::DispatchPost(post.as_ref().into())
            }
        };
        UpdateFrame {
            id: Some((&frame.id).into()),
            base_timestamp_epoch_ms: frame.base_timestamp.timestamp_millis(),
            payload: Some(payload),
        }
    }
}

impl From<&model::snapshot::RemovalFrame> for RemovalFrame {
    fn from(frame: &model::snapshot::RemovalFrame) -> Self {
        RemovalFrame {
            id: Some((&frame.id).into()),
            base_timestamp_epoch_ms: frame.base_timestamp.timestamp_millis(),
        }
    }
}

/// Convenience used only by tests: confirms a `ServerId` survives an
/// encode/parse-as-string round trip through the wire frame.
pub fn parse_server_id(raw: &str) -> Option<ServerId> {
    uuid::Uuid::parse_str(raw).ok().map(ServerId::new)
}
