//! Deterministic id namespaces for every entity kind (spec §9).
//!
//! Each namespace is fixed forever once chosen; changing one would silently
//! reassign every existing stable id on the next full rebuild.

use uuid::Uuid;

use utility::id::HasId;

use crate::dispatch_post::DispatchPost;
use crate::journey::Journey;
use crate::journey_event::JourneyEvent;
use crate::server::Server;

pub const SERVER_NAMESPACE: Uuid = Uuid::from_bytes([
    0x4d, 0x4e, 0x27, 0x1c, 0x0a, 0x1b, 0x4e, 0x9c, 0x9a, 0x2f, 0x6c, 0x1a, 0x9d, 0x9e, 0x9b, 0x01,
]);
pub const JOURNEY_NAMESPACE: Uuid = Uuid::from_bytes([
    0x7a, 0x3b, 0x6e, 0x2d, 0x4f, 0x1e, 0x4c, 0x8a, 0xb1, 0x3d, 0x5e, 0x2b, 0x7c, 0x9f, 0x1a, 0x02,
]);
pub const JOURNEY_EVENT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x1f, 0x9c, 0x3a, 0x5d, 0x6b, 0x2e, 0x41, 0x7a, 0x9d, 0x0c, 0x3e, 0x7b, 0x1a, 0x4f, 0x9e, 0x03,
]);
/// Distinct namespace for just-in-time inserted events (spec §3), so an
/// inserted event's id can never collide with a scheduled one's.
pub const JOURNEY_EVENT_JIT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x2d, 0x8e, 0x4b, 0x6a, 0x7c, 0x3f, 0x42, 0x9b, 0xae, 0x1d, 0x4f, 0x8c, 0x2b, 0x5a, 0x9f, 0x04,
]);
pub const DISPATCH_POST_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3e, 0x7d, 0x5c, 0x9b, 0x8a, 0x4f, 0x43, 0xac, 0xbf, 0x2e, 0x5a, 0x9d, 0x3c, 0x6b, 0xaf, 0x05,
]);

impl HasId for Server {
    type IdType = Uuid;
}
impl HasId for Journey {
    type IdType = Uuid;
}
impl HasId for JourneyEvent {
    type IdType = Uuid;
}
impl HasId for DispatchPost {
    type IdType = Uuid;
}

pub type ServerId = utility::id::Id<Server>;
pub type JourneyId = utility::id::Id<Journey>;
pub type JourneyEventId = utility::id::Id<JourneyEvent>;
pub type DispatchPostId = utility::id::Id<DispatchPost>;

pub fn server_id(upstream_code: &str, upstream_id: &str) -> ServerId {
    ServerId::from_namespace(SERVER_NAMESPACE, &format!("{upstream_code}:{upstream_id}"))
}

pub fn journey_id(server_id: ServerId, upstream_run_id: &str) -> JourneyId {
    JourneyId::from_namespace(
        JOURNEY_NAMESPACE,
        &format!("{}:{}", server_id.raw(), upstream_run_id),
    )
}

pub fn journey_event_id(
    journey_id: JourneyId,
    point_id: &str,
    scheduled_local: &str,
    event_type: &str,
) -> JourneyEventId {
    JourneyEventId::from_namespace(
        JOURNEY_EVENT_NAMESPACE,
        &format!(
            "{}:{}:{}:{}",
            journey_id.raw(),
            point_id,
            scheduled_local,
            event_type
        ),
    )
}

/// Just-in-time pair id: derived from the previous event rather than a
/// scheduled local time, since there isn't one.
pub fn journey_event_jit_id(
    journey_id: JourneyId,
    point_id: &str,
    prev_event_id: JourneyEventId,
    event_type: &str,
) -> JourneyEventId {
    JourneyEventId::from_namespace(
        JOURNEY_EVENT_JIT_NAMESPACE,
        &format!(
            "{}:{}:{}:{}",
            journey_id.raw(),
            point_id,
            prev_event_id.raw(),
            event_type
        ),
    )
}

pub fn dispatch_post_id(server_code: &str, upstream_id: &str) -> DispatchPostId {
    DispatchPostId::from_namespace(
        DISPATCH_POST_NAMESPACE,
        &format!("{server_code}:{upstream_id}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journey_id_is_stable_per_run() {
        let server = server_id("en1", "abc123");
        let a = journey_id(server, "run-1");
        let b = journey_id(server, "run-1");
        assert_eq!(a, b);
    }

    #[test]
    fn jit_and_scheduled_ids_never_collide() {
        let server = server_id("en1", "abc123");
        let journey = journey_id(server, "run-1");
        let scheduled = journey_event_id(journey, "point-1", "2026-08-01T12:00:00", "ARRIVAL");
        let jit = journey_event_jit_id(journey, "point-1", scheduled, "ARRIVAL");
        assert_ne!(scheduled, jit);
    }
}
