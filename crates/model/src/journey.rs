use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JourneyId, ServerId};
use crate::journey_event::JourneyEvent;

/// A single scheduled train run on one server (spec §3).
///
/// `events` is an owned, ordered sequence rather than a graph: events hold
/// their `journey_id`, never a back-pointer to the owning journey (spec §9
/// "Cyclic reference between Journey and JourneyEvent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub id: JourneyId,
    pub upstream_run_id: String,
    pub server_id: ServerId,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub events: Vec<JourneyEvent>,
}

impl Journey {
    pub fn new(id: JourneyId, upstream_run_id: String, server_id: ServerId) -> Self {
        Self {
            id,
            upstream_run_id,
            server_id,
            first_seen_at: None,
            last_seen_at: None,
            cancelled: false,
            events: Vec::new(),
        }
    }

    /// Spec §4.5a invariant: set once, never reset.
    pub fn mark_first_seen(&mut self, at: DateTime<Utc>) {
        if self.first_seen_at.is_none() {
            self.first_seen_at = Some(at);
        }
    }

    pub fn events_sorted_by_index(&self) -> Vec<&JourneyEvent> {
        let mut refs: Vec<&JourneyEvent> = self.events.iter().collect();
        refs.sort_by_key(|e| e.event_index);
        refs
    }
}
